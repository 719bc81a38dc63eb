//! # Chat platform abstraction
//!
//! Everything the bot needs from the chat service goes through the
//! [`ChatPlatform`] trait. The core never talks to a gateway or an HTTP
//! client directly, which keeps it testable against [`MemoryPlatform`].
//!
//! ```text
//! gateway ──► PlatformEvent ──► EventRouter ──► GuildRegistry / BiasEngine
//!                                                   │
//!                                                   ▼
//!                                             ChatPlatform (queries + mutations)
//! ```
//!
//! ## Adapters
//!
//! - [`MemoryPlatform`]: in-process server state, used by the test suite
//! - `discord::DiscordPlatform` (feature `discord`): serenity HTTP client

pub mod adapter;
pub mod event;
pub mod memory;

#[cfg(feature = "discord")]
pub mod discord;

pub use adapter::{ChatPlatform, PlatformError};
pub use event::{CommandInvocation, GuildEvent, PlatformEvent};
pub use memory::{FailPoint, MemoryPlatform, PlatformCall};

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

platform_id!(
    /// A chat server instance the bot is present in.
    GuildId
);
platform_id!(
    /// A role defined on a guild.
    RoleId
);
platform_id!(
    /// A channel of any kind.
    ChannelId
);
platform_id!(
    /// A user account; scoped to a guild through [`MemberRef`].
    UserId
);

/// A platform role as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Displayed separately in the member list.
    pub hoist: bool,
}

/// Channel kinds the bot distinguishes. Only [`ChannelKind::Text`] matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Other,
}

/// A guild channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }
}

/// A member of one guild. Role sets are never stored here: they are
/// re-read through [`ChatPlatform::current_roles`] whenever needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub name: String,
}

impl MemberRef {
    pub fn new(guild_id: GuildId, user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            guild_id,
            user_id,
            name: name.into(),
        }
    }

    /// Mention markup that pings the member when sent in a message.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_markup() {
        let member = MemberRef::new(GuildId(1), UserId(42), "dana");
        assert_eq!(member.mention(), "<@42>");
        assert_eq!(member.to_string(), "dana (42)");
    }

    #[test]
    fn test_only_text_channels_are_text() {
        let mut channel = Channel {
            id: ChannelId(5),
            guild_id: GuildId(1),
            name: "general".to_string(),
            kind: ChannelKind::Voice,
        };
        assert!(!channel.is_text());
        channel.kind = ChannelKind::Text;
        assert!(channel.is_text());
    }
}
