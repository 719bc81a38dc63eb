//! Error types for role provisioning, role mutation and channel resolution.
//!
//! None of these abort the bot. Each one disables a single feature for a
//! single guild (provisioning, channel resolution) or abandons a single
//! command (mutation). Configuration errors live in [`crate::config`].

use std::fmt;

use thiserror::Error;

use crate::platform::{GuildId, PlatformError, UserId};

/// Building a guild's role catalog failed. The guild has no bias support
/// until the next ready.
#[derive(Debug, Error)]
pub enum RoleProvisionError {
    /// The guild's role list could not be read.
    #[error("Failed to list roles of guild {guild}: {source}")]
    Lookup {
        guild: GuildId,
        #[source]
        source: PlatformError,
    },

    /// A missing role could not be created.
    #[error("Failed to create role {role:?} in guild {guild}: {source}")]
    Create {
        guild: GuildId,
        role: String,
        #[source]
        source: PlatformError,
    },
}

impl RoleProvisionError {
    pub fn guild(&self) -> GuildId {
        match self {
            Self::Lookup { guild, .. } | Self::Create { guild, .. } => *guild,
        }
    }
}

/// Which role mutation was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ReadRoles,
    Replace,
    Add,
    Remove,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadRoles => write!(f, "read roles"),
            Self::Replace => write!(f, "replace roles"),
            Self::Add => write!(f, "add role"),
            Self::Remove => write!(f, "remove role"),
        }
    }
}

/// A live role change for a member failed. Logged; never announced.
#[derive(Debug, Error)]
#[error("Failed to {kind} {role:?} for member {user} in guild {guild}: {source}")]
pub struct RoleMutationError {
    pub guild: GuildId,
    pub user: UserId,
    pub kind: MutationKind,
    pub role: String,
    #[source]
    pub source: PlatformError,
}

/// A configured channel name matched no text channel in the guild.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No text channel named {name:?} in guild {guild}")]
pub struct ChannelResolutionError {
    pub guild: GuildId,
    pub name: String,
}
