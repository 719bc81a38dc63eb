//! Tracing setup.
//!
//! Three sinks share one [`EnvFilter`] (taken from `RUST_LOG` when set):
//!
//! - the configured log file, INFO and above, no colors
//! - stderr, WARN and above
//! - stdout, DEBUG and above, only with `--debug`

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "info,fanman=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. Fails if the log file cannot be opened or
/// a subscriber is already installed.
pub fn init(logfile: &Path, debug: bool) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logfile)
        .with_context(|| format!("failed to open log file {}", logfile.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let file_layer = fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_filter(LevelFilter::INFO);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_filter(LevelFilter::WARN);
    let stdout_layer = debug.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .with(stdout_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(path = %logfile.display(), "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "info");
        assert!(default_filter(true).contains("fanman=debug"));
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("fanman.log");
        let err = init(&path, false).unwrap_err();
        assert!(err.to_string().contains("failed to open log file"));
    }
}
