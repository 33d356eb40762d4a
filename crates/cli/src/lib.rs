pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pricewatch_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pricewatch",
    about = "Pricewatch deal scoring CLI",
    long_about = "Score a batch of scraped product observations for suspicious discounts and inspect the effective engine configuration.",
    after_help = "Examples:\n  pricewatch analyze --input batch.json --pretty\n  pricewatch config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Score a JSON batch of product observations and print the report")]
    Analyze {
        #[arg(long, help = "Path to a JSON array of product observations")]
        input: PathBuf,
        #[arg(long, help = "Explicit config file (must exist when given)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Pretty-print the JSON report")]
        pretty: bool,
        #[arg(long, help = "Override the suspicion flag threshold for this run")]
        flag_threshold: Option<f64>,
    },
    #[command(about = "Inspect effective engine configuration values with source attribution")]
    Config {
        #[arg(long, help = "Explicit config file to inspect")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Analyze { input, config, pretty, flag_threshold } => {
            commands::analyze::run(commands::analyze::AnalyzeOptions {
                input,
                config,
                pretty,
                flag_threshold,
            })
        }
        Command::Config { config } => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(config.as_deref()),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Install the global subscriber. Logs go to stderr so stdout stays pure
/// JSON. A second call is a no-op.
pub fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.trim().to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        tracing::debug!(
            event_name = "cli.logging.already_initialized",
            error = %error,
            "global subscriber already installed, keeping it"
        );
    }
}
