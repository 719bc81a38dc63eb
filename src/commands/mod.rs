//! Text commands.
//!
//! | command          | effect                               |
//! |------------------|--------------------------------------|
//! | `bias <name>`    | make `<name>` the member's only bias |
//! | `sbias <name>`   | add sub-bias `<name>`                |
//! | `unbias`         | drop the member's bias               |
//! | `unsbias <name>` | drop sub-bias `<name>`               |
//!
//! Commands from guilds without a role catalog, with unknown names or with a
//! missing argument do nothing and produce no reply.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bias::BiasEngine;
use crate::guild::GuildRegistry;
use crate::platform::CommandInvocation;

/// A recognized command with its normalized argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bias(String),
    SubBias(String),
    Unbias,
    Unsbias(String),
}

impl Command {
    /// Map a command name and its arguments. Extra arguments are ignored.
    pub fn parse(name: &str, args: &[String]) -> Option<Self> {
        let arg = || args.first().map(|a| a.to_lowercase());
        match name {
            "bias" => arg().map(Self::Bias),
            "sbias" => arg().map(Self::SubBias),
            "unbias" => Some(Self::Unbias),
            "unsbias" => arg().map(Self::Unsbias),
            _ => None,
        }
    }
}

/// Split a chat message into command name and arguments if it starts with
/// `prefix`.
pub fn parse_message(content: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    if prefix.is_empty() {
        return None;
    }
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?;
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((name.to_string(), words.map(str::to_string).collect()))
}

/// Runs commands against the bias engine and renders replies.
pub struct CommandDispatcher {
    guilds: Arc<GuildRegistry>,
    engine: BiasEngine,
}

impl CommandDispatcher {
    pub fn new(guilds: Arc<GuildRegistry>, engine: BiasEngine) -> Self {
        Self { guilds, engine }
    }

    /// Execute `invocation`. Returns the reply to post, if any.
    pub async fn dispatch(&self, invocation: &CommandInvocation) -> Option<String> {
        let command = Command::parse(&invocation.name, &invocation.args)?;
        let member = &invocation.member;

        if self.guilds.catalog(member.guild_id).is_none() {
            debug!(guild = %member.guild_id, command = %invocation.name, "Guild has no bias roles");
            return None;
        }

        let result = match &command {
            Command::Bias(name) => self.engine.set_bias(member, name).await,
            Command::SubBias(name) => self.engine.set_sub_bias(member, name).await,
            Command::Unbias => self.engine.clear_bias(member).await,
            Command::Unsbias(name) => self.engine.clear_sub_bias(member, name).await,
        };

        match result {
            Ok(Some(outcome)) => {
                if outcome.is_change() {
                    info!(member = %member, command = ?command, "Roles updated");
                }
                Some(outcome.render(member))
            }
            Ok(None) => None,
            Err(err) => {
                warn!(command = ?command, error = %err, "Role update failed");
                None
            }
        }
    }
}
