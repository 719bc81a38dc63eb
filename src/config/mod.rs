//! Bot configuration.
//!
//! Loaded from a YAML document. Every key is optional; keys that are absent
//! keep their default value. See `config.yml.example` for a full file.
//!
//! ```yaml
//! token: "..."
//! logfile: discord-fanman.log
//! bias_roles: [alice, bora]     # a single scalar is accepted too
//! general_channel: "#general"
//! updates_channel: "#updates"
//! join_message: "Welcome {user}!"
//! part_message: "{user} left us."
//! command_prefix: "."
//! ```

pub mod error;

pub use error::ConfigError;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

use crate::guild::catalog::BiasName;
use crate::guild::channels::ChannelNames;

/// Placeholder replaced by the member's mention in join/part templates.
pub const MENTION_PLACEHOLDER: &str = "{user}";

/// Runtime configuration of the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot account token.
    pub token: String,
    /// Log file path.
    pub logfile: PathBuf,
    /// Configured bias names, as written.
    #[serde(deserialize_with = "one_or_many")]
    pub bias_roles: Vec<String>,
    /// Channel that receives join/part announcements, `#`-prefixed.
    pub general_channel: String,
    /// Channel for bot updates, `#`-prefixed.
    pub updates_channel: String,
    pub join_message: Option<String>,
    pub part_message: Option<String>,
    /// Prefix that marks a message as a command.
    pub command_prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: "token".to_string(),
            logfile: PathBuf::from("discord-fanman.log"),
            bias_roles: Vec::new(),
            general_channel: "#general".to_string(),
            updates_channel: "#updates".to_string(),
            join_message: None,
            part_message: None,
            command_prefix: ".".to_string(),
        }
    }
}

impl BotConfig {
    /// Parse a configuration document. An empty document yields defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let blank = text.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if blank {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(text)?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(_) => Ok(serde_yaml::from_value(value)?),
            Value::Bool(_) => Err(ConfigError::NotAMapping("a boolean")),
            Value::Number(_) => Err(ConfigError::NotAMapping("a number")),
            Value::String(_) => Err(ConfigError::NotAMapping("a string")),
            Value::Sequence(_) => Err(ConfigError::NotAMapping("a list")),
            Value::Tagged(_) => Err(ConfigError::NotAMapping("a tagged value")),
        }
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_yaml(&text)
    }

    /// Load the file, falling back to defaults on any error.
    ///
    /// The error is handed back instead of logged because logging is set up
    /// from the configuration itself.
    pub fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }

    /// Canonical bias names: lower-cased, de-duplicated in first-seen order.
    ///
    /// Names without a cased first character are skipped since their bias
    /// and sub-bias roles would share one display name.
    pub fn bias_names(&self) -> Vec<BiasName> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for raw in &self.bias_roles {
            let Some(name) = BiasName::parse(raw) else {
                tracing::warn!(name = %raw, "Ignoring unusable bias name");
                continue;
            };
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
        names
    }

    /// Channel names with the `#` prefix stripped.
    pub fn channel_names(&self) -> ChannelNames {
        ChannelNames::new(&self.general_channel, &self.updates_channel)
    }
}

/// Accept `bias_roles: name` as well as `bias_roles: [a, b]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .map(scalar_to_string)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| D::Error::custom("bias_roles entries must be plain names")),
        other => scalar_to_string(other)
            .map(|name| vec![name])
            .ok_or_else(|| D::Error::custom("bias_roles must be a name or a list of names")),
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = BotConfig::from_yaml(
            r#"
token: "abc"
bias_roles: [alice, bora]
join_message: "Welcome {user}!"
"#,
        )
        .unwrap();

        assert_eq!(config.token, "abc");
        assert_eq!(config.bias_roles, vec!["alice", "bora"]);
        assert_eq!(config.join_message.as_deref(), Some("Welcome {user}!"));
        assert_eq!(config.part_message, None);
        assert_eq!(config.general_channel, "#general");
        assert_eq!(config.logfile, PathBuf::from("discord-fanman.log"));
        assert_eq!(config.command_prefix, ".");
    }

    #[test]
    fn test_scalar_bias_roles_becomes_list() {
        let config = BotConfig::from_yaml("bias_roles: alice\n").unwrap();
        assert_eq!(config.bias_roles, vec!["alice"]);

        let config = BotConfig::from_yaml("bias_roles: ~\n").unwrap();
        assert!(config.bias_roles.is_empty());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(BotConfig::from_yaml("").unwrap(), BotConfig::default());
        assert_eq!(BotConfig::from_yaml("# nothing\n").unwrap(), BotConfig::default());
    }

    #[test]
    fn test_non_mapping_document_is_rejected() {
        let err = BotConfig::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping("a list")));
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        let err = BotConfig::from_yaml("token: [unclosed\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, err) = BotConfig::load_or_default(&dir.path().join("config.yml"));
        assert_eq!(config, BotConfig::default());
        assert!(err.unwrap().is_missing());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bias_roles: {{alice: 1}}").unwrap();

        let (config, err) = BotConfig::load_or_default(file.path());
        assert_eq!(config, BotConfig::default());
        let err = err.unwrap();
        assert!(!err.is_missing());
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "updates_channel: \"#news\"").unwrap();

        let config = BotConfig::load(file.path()).unwrap();
        assert_eq!(config.updates_channel, "#news");
        assert_eq!(config.channel_names().updates, "news");
    }

    #[test]
    fn test_bias_names_are_normalized() {
        let config = BotConfig {
            bias_roles: vec![
                "Alice".to_string(),
                "alice".to_string(),
                "BORA".to_string(),
                "".to_string(),
                "123".to_string(),
            ],
            ..BotConfig::default()
        };

        let names: Vec<String> = config
            .bias_names()
            .into_iter()
            .map(|n| n.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["alice", "bora"]);
    }

    #[test]
    fn test_example_file_parses() {
        let config = BotConfig::from_yaml(include_str!("../../config.yml.example")).unwrap();
        assert_eq!(config.bias_roles, vec!["alice", "bora"]);
        assert_eq!(config.channel_names().general, "general");
        assert_eq!(config.command_prefix, ".");
    }
}
