//! ChatPlatform trait: the contract for chat service adapters.

use async_trait::async_trait;

use super::{Channel, ChannelId, GuildId, MemberRef, Role, RoleId};

/// Queries and mutations the bot issues against a chat service.
///
/// Queries must reflect live server state. In particular
/// [`current_roles`](Self::current_roles) must not be answered from a cache:
/// the bias engine reads it inside its per-member critical section and
/// computes the mutation from the result.
///
/// Each mutation is all-or-nothing on the platform side.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Adapter name for log lines (e.g. "discord", "memory").
    fn name(&self) -> &str;

    /// All roles defined on the guild.
    async fn list_roles(&self, guild: GuildId) -> Result<Vec<Role>, PlatformError>;

    /// All channels of the guild, of any kind.
    async fn list_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError>;

    /// The member's currently assigned roles.
    async fn current_roles(&self, member: &MemberRef) -> Result<Vec<RoleId>, PlatformError>;

    /// Create a role on the guild.
    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        hoist: bool,
    ) -> Result<Role, PlatformError>;

    /// Replace the member's whole role set in a single call.
    async fn replace_roles(&self, member: &MemberRef, roles: &[RoleId])
        -> Result<(), PlatformError>;

    /// Add one role to the member.
    async fn add_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError>;

    /// Remove one role from the member.
    async fn remove_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError>;

    /// Post a plain text message to a channel.
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError>;
}

/// Adapter error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}
