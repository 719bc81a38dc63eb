//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the bot configuration.
///
/// All of them are recoverable: the caller falls back to defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing or field validation failed.
    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed but is not a key/value mapping.
    #[error("Invalid configuration: expected a mapping at the top level, found {0}")]
    NotAMapping(&'static str),
}

impl ConfigError {
    /// A missing file is expected on first run and only worth an info line.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
