//! Events delivered by a platform adapter to the router.

use super::{Channel, ChannelId, GuildId, MemberRef};

/// Connection lifecycle and guild-scoped events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The adapter started (re)connecting to the gateway.
    Connecting,
    /// Session established; lists every guild the bot is a member of.
    Ready { guilds: Vec<GuildId> },
    /// The gateway session dropped.
    Disconnected,
    /// A guild became available after ready, or the bot joined a new guild.
    GuildAvailable(GuildId),
    /// The bot left the guild or the guild was deleted.
    GuildRemoved(GuildId),
    /// Channel or membership change inside one guild.
    Guild(GuildEvent),
    /// A member invoked a bot command.
    Command(CommandInvocation),
}

/// Events that belong to exactly one guild and may be queued until that
/// guild finished provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuildEvent {
    ChannelCreated(Channel),
    ChannelDeleted(Channel),
    MemberJoined(MemberRef),
    MemberRemoved(MemberRef),
}

impl GuildEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::ChannelCreated(channel) | Self::ChannelDeleted(channel) => channel.guild_id,
            Self::MemberJoined(member) | Self::MemberRemoved(member) => member.guild_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelCreated(_) => "channel_created",
            Self::ChannelDeleted(_) => "channel_deleted",
            Self::MemberJoined(_) => "member_joined",
            Self::MemberRemoved(_) => "member_removed",
        }
    }
}

/// A parsed command with the context it was invoked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub member: MemberRef,
    /// Channel the command was typed in; replies go back there.
    pub channel: ChannelId,
    pub name: String,
    pub args: Vec<String>,
}

impl CommandInvocation {
    pub fn guild_id(&self) -> GuildId {
        self.member.guild_id
    }
}
