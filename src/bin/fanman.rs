//! fanman bot binary.
//!
//! ```bash
//! cargo run --features discord -- -c config.yml --debug
//! ```
//!
//! A missing config file is not fatal: the bot starts with defaults.

use std::process::ExitCode;

use clap::Parser;
use fanman::cli::Cli;
use fanman::config::BotConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config, config_error) = BotConfig::load_or_default(&cli.config_file);

    if let Err(e) = fanman::logging::init(&config.logfile, cli.debug) {
        eprintln!("fanman: {:#}", e);
        return ExitCode::FAILURE;
    }

    match config_error {
        Some(e) if e.is_missing() => {
            tracing::info!("{}, using defaults", e);
        }
        Some(e) => tracing::error!("Invalid configuration, using defaults: {}", e),
        None => tracing::info!(path = %cli.config_file.display(), "Configuration loaded"),
    }
    tracing::info!(
        version = fanman::VERSION,
        biases = config.bias_names().len(),
        "fanman starting"
    );

    match fanman::platform::discord::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
