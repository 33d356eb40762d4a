use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pricewatch_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use pricewatch_core::{parse_batch, DealAnalyzer, EngineError, ProductObservation};
use tracing::info;

use crate::commands::CommandResult;

const COMMAND: &str = "analyze";

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub pretty: bool,
    pub flag_threshold: Option<f64>,
}

pub fn run(options: AnalyzeOptions) -> CommandResult {
    let load_options = LoadOptions {
        require_file: options.config.is_some(),
        config_path: options.config,
        overrides: ConfigOverrides {
            flag_threshold: options.flag_threshold,
            ..ConfigOverrides::default()
        },
    };
    let config = match AppConfig::load(load_options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config.logging);

    let batch = match read_batch(&options.input) {
        Ok(batch) => batch,
        Err(error) => {
            let (error_class, exit_code) = match error.downcast_ref::<EngineError>() {
                Some(engine_error) => (engine_error.error_class(), 4),
                None => ("input_read", 3),
            };
            return CommandResult::failure(COMMAND, error_class, format!("{error:#}"), exit_code);
        }
    };

    let analyzer = match DealAnalyzer::new(config.engine) {
        Ok(analyzer) => analyzer,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };
    let report = analyzer.analyze(&batch);
    info!(
        event_name = "cli.analyze.completed",
        input = %options.input.display(),
        products = report.summary.total_products,
        flagged = report.summary.flagged_products,
        "analysis report ready"
    );

    let rendered = if options.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };
    match rendered {
        Ok(output) => CommandResult::report(output),
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 5),
    }
}

fn read_batch(path: &Path) -> anyhow::Result<Vec<ProductObservation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file `{}`", path.display()))?;
    let batch = parse_batch(&raw)?;
    Ok(batch)
}
