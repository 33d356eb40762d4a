use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::Category;

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Thresholds and weights read once at the start of a run. The engine never
/// mutates this; runs with different configurations can execute side by side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// z-score of a discount above which it counts as a statistical outlier.
    pub z_score_threshold: f64,
    /// Fence multiplier `k` for `[Q1 - k*IQR, Q3 + k*IQR]`.
    pub iqr_multiplier: f64,
    /// Suspicion score at or above which a product is flagged.
    pub flag_threshold: f64,
    pub tiers: DiscountTiers,
    pub weights: SuspicionWeights,
    /// Discount at or above which the validator reports EXTREME_DISCOUNT.
    pub implausible_discount_pct: f64,
    /// Allowed gap, in percentage points, between computed and advertised discount.
    pub discount_mismatch_tolerance_pct: f64,
    /// Prices above this are reported as EXCESSIVE_PRICE.
    pub max_price: Decimal,
    /// Original prices above this count as high-value for HIGH_VALUE_EXTREME_DISCOUNT.
    pub high_value_price: Decimal,
    /// Discount above which a high-value item is reported.
    pub high_value_discount_pct: f64,
    pub round_numbers: Vec<Decimal>,
    /// Distance from a round multiple still treated as round (catches 1999, 2999).
    pub round_price_tolerance: Decimal,
    pub marketing_discounts: Vec<f64>,
    pub round_discount_tolerance_pct: f64,
    /// Tolerance for `original ~= 2 * current`, as a percentage of the original price.
    pub doubling_tolerance_pct: f64,
    pub inflated_original_multiplier: f64,
    pub average_after_discount_min_pct: f64,
    pub below_median_ratio: f64,
    /// Savings that earn the full absolute-savings points in deal quality.
    pub reference_savings: f64,
    pub exceptional_deal_quality: f64,
    /// Priced products a category needs before price-positioning checks run.
    pub min_category_samples: usize,
    /// Findings below this confidence are not surfaced.
    pub min_confidence: f64,
    pub tgtbt_savings_floor: f64,
    pub premium_brands: Vec<String>,
    pub premium_categories: Vec<Category>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountTiers {
    pub critical: f64,
    pub very_high: f64,
    pub high: f64,
}

impl Default for DiscountTiers {
    fn default() -> Self {
        Self { critical: 90.0, very_high: 80.0, high: 70.0 }
    }
}

/// Points each suspicion check contributes when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionWeights {
    pub statistical_outlier: f64,
    pub critical_discount: f64,
    pub very_high_discount: f64,
    pub high_discount: f64,
    pub below_category_median: f64,
    pub round_original: f64,
    pub inflated_original: f64,
    pub exceptional_deal: f64,
}

impl Default for SuspicionWeights {
    fn default() -> Self {
        Self {
            statistical_outlier: 30.0,
            critical_discount: 40.0,
            very_high_discount: 30.0,
            high_discount: 20.0,
            below_category_median: 25.0,
            round_original: 10.0,
            inflated_original: 20.0,
            exceptional_deal: 15.0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 2.5,
            iqr_multiplier: 1.5,
            flag_threshold: 40.0,
            tiers: DiscountTiers::default(),
            weights: SuspicionWeights::default(),
            implausible_discount_pct: 95.0,
            discount_mismatch_tolerance_pct: 2.0,
            max_price: Decimal::new(100_000, 0),
            high_value_price: Decimal::new(1_000, 0),
            high_value_discount_pct: 80.0,
            round_numbers: [50, 100, 500, 1000, 1500, 2000]
                .into_iter()
                .map(|value| Decimal::new(value, 0))
                .collect(),
            round_price_tolerance: Decimal::ONE,
            marketing_discounts: vec![50.0, 75.0, 33.3, 66.7],
            round_discount_tolerance_pct: 0.5,
            doubling_tolerance_pct: 2.0,
            inflated_original_multiplier: 2.5,
            average_after_discount_min_pct: 40.0,
            below_median_ratio: 0.2,
            reference_savings: 5000.0,
            exceptional_deal_quality: 85.0,
            min_category_samples: 3,
            min_confidence: 0.6,
            tgtbt_savings_floor: 2000.0,
            premium_brands: ["apple", "samsung", "sony", "bose", "dyson", "lg"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            premium_categories: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub flag_threshold: Option<f64>,
    pub z_score_threshold: Option<f64>,
    pub min_confidence: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricewatch.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            self.engine = engine;
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PRICEWATCH_Z_SCORE_THRESHOLD") {
            self.engine.z_score_threshold = parse_f64("PRICEWATCH_Z_SCORE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PRICEWATCH_IQR_MULTIPLIER") {
            self.engine.iqr_multiplier = parse_f64("PRICEWATCH_IQR_MULTIPLIER", &value)?;
        }
        if let Some(value) = read_env("PRICEWATCH_FLAG_THRESHOLD") {
            self.engine.flag_threshold = parse_f64("PRICEWATCH_FLAG_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PRICEWATCH_MIN_CONFIDENCE") {
            self.engine.min_confidence = parse_f64("PRICEWATCH_MIN_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("PRICEWATCH_INFLATED_ORIGINAL_MULTIPLIER") {
            self.engine.inflated_original_multiplier =
                parse_f64("PRICEWATCH_INFLATED_ORIGINAL_MULTIPLIER", &value)?;
        }
        if let Some(value) = read_env("PRICEWATCH_ROUND_NUMBERS") {
            self.engine.round_numbers = parse_decimal_list("PRICEWATCH_ROUND_NUMBERS", &value)?;
        }

        let log_level =
            read_env("PRICEWATCH_LOGGING_LEVEL").or_else(|| read_env("PRICEWATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICEWATCH_LOGGING_FORMAT").or_else(|| read_env("PRICEWATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(flag_threshold) = overrides.flag_threshold {
            self.engine.flag_threshold = flag_threshold;
        }
        if let Some(z_score_threshold) = overrides.z_score_threshold {
            self.engine.z_score_threshold = z_score_threshold;
        }
        if let Some(min_confidence) = overrides.min_confidence {
            self.engine.min_confidence = min_confidence;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl EngineConfig {
    /// Reject configurations that would silently corrupt every score in a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("engine.z_score_threshold", self.z_score_threshold),
            ("engine.flag_threshold", self.flag_threshold),
            ("engine.discount_mismatch_tolerance_pct", self.discount_mismatch_tolerance_pct),
            ("engine.round_discount_tolerance_pct", self.round_discount_tolerance_pct),
            ("engine.doubling_tolerance_pct", self.doubling_tolerance_pct),
            ("engine.average_after_discount_min_pct", self.average_after_discount_min_pct),
            ("engine.below_median_ratio", self.below_median_ratio),
            ("engine.exceptional_deal_quality", self.exceptional_deal_quality),
            ("engine.tgtbt_savings_floor", self.tgtbt_savings_floor),
            ("engine.weights.statistical_outlier", self.weights.statistical_outlier),
            ("engine.weights.critical_discount", self.weights.critical_discount),
            ("engine.weights.very_high_discount", self.weights.very_high_discount),
            ("engine.weights.high_discount", self.weights.high_discount),
            ("engine.weights.below_category_median", self.weights.below_category_median),
            ("engine.weights.round_original", self.weights.round_original),
            ("engine.weights.inflated_original", self.weights.inflated_original),
            ("engine.weights.exceptional_deal", self.weights.exceptional_deal),
        ];
        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a finite, non-negative number (got {value})"
                )));
            }
        }

        let positive = [
            ("engine.iqr_multiplier", self.iqr_multiplier),
            ("engine.inflated_original_multiplier", self.inflated_original_multiplier),
            ("engine.reference_savings", self.reference_savings),
        ];
        for (key, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{key} must be greater than zero (got {value})"
                )));
            }
        }

        let tiers = &self.tiers;
        for (key, value) in [
            ("engine.tiers.critical", tiers.critical),
            ("engine.tiers.very_high", tiers.very_high),
            ("engine.tiers.high", tiers.high),
            ("engine.implausible_discount_pct", self.implausible_discount_pct),
            ("engine.high_value_discount_pct", self.high_value_discount_pct),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be in range 0..=100")));
            }
        }
        if tiers.critical < tiers.very_high || tiers.very_high < tiers.high {
            return Err(ConfigError::Validation(
                "engine.tiers must satisfy critical >= very_high >= high".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Validation(
                "engine.min_confidence must be in range 0..=1".to_string(),
            ));
        }

        if self.round_numbers.is_empty() {
            return Err(ConfigError::Validation(
                "engine.round_numbers must contain at least one value".to_string(),
            ));
        }
        if self.round_numbers.iter().any(|value| *value <= Decimal::ZERO) {
            return Err(ConfigError::Validation(
                "engine.round_numbers must all be greater than zero".to_string(),
            ));
        }
        if self.round_price_tolerance < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "engine.round_price_tolerance must not be negative".to_string(),
            ));
        }
        if self.high_value_price < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "engine.high_value_price must not be negative".to_string(),
            ));
        }
        if self.max_price <= Decimal::ZERO {
            return Err(ConfigError::Validation(
                "engine.max_price must be greater than zero".to_string(),
            ));
        }

        if self.marketing_discounts.iter().any(|pct| !(0.0..=100.0).contains(pct)) {
            return Err(ConfigError::Validation(
                "engine.marketing_discounts must be percentages in range 0..=100".to_string(),
            ));
        }

        if self.min_category_samples == 0 {
            return Err(ConfigError::Validation(
                "engine.min_category_samples must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricewatch.toml"), PathBuf::from("config/pricewatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal_list(key: &str, value: &str) -> Result<Vec<Decimal>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EngineConfig>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
