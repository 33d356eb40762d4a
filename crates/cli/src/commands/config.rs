use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricewatch_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run(explicit_path: Option<&Path>) -> String {
    let options = LoadOptions {
        config_path: explicit_path.map(Path::to_path_buf),
        require_file: explicit_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let engine = &config.engine;
    let round_numbers =
        engine.round_numbers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");

    let entries = [
        (
            "engine.z_score_threshold",
            engine.z_score_threshold.to_string(),
            source("engine.z_score_threshold", &["PRICEWATCH_Z_SCORE_THRESHOLD"]),
        ),
        (
            "engine.iqr_multiplier",
            engine.iqr_multiplier.to_string(),
            source("engine.iqr_multiplier", &["PRICEWATCH_IQR_MULTIPLIER"]),
        ),
        (
            "engine.flag_threshold",
            engine.flag_threshold.to_string(),
            source("engine.flag_threshold", &["PRICEWATCH_FLAG_THRESHOLD"]),
        ),
        (
            "engine.min_confidence",
            engine.min_confidence.to_string(),
            source("engine.min_confidence", &["PRICEWATCH_MIN_CONFIDENCE"]),
        ),
        (
            "engine.inflated_original_multiplier",
            engine.inflated_original_multiplier.to_string(),
            source(
                "engine.inflated_original_multiplier",
                &["PRICEWATCH_INFLATED_ORIGINAL_MULTIPLIER"],
            ),
        ),
        (
            "engine.round_numbers",
            format!("[{round_numbers}]"),
            source("engine.round_numbers", &["PRICEWATCH_ROUND_NUMBERS"]),
        ),
        (
            "engine.tiers",
            format!(
                "critical {} / very_high {} / high {}",
                engine.tiers.critical, engine.tiers.very_high, engine.tiers.high
            ),
            source("engine.tiers", &[]),
        ),
        (
            "engine.min_category_samples",
            engine.min_category_samples.to_string(),
            source("engine.min_category_samples", &[]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["PRICEWATCH_LOGGING_LEVEL", "PRICEWATCH_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["PRICEWATCH_LOGGING_FORMAT", "PRICEWATCH_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, source)| render_line(key, &value, source)));
    lines.join("\n")
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("pricewatch.toml"), PathBuf::from("config/pricewatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_hit =
        env_keys.iter().find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_hit {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
