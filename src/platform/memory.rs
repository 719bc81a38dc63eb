//! In-memory chat platform.
//!
//! Holds guild roles, channels and member role sets in process, records
//! every mutation it receives, and can be told to fail specific operations.
//! Every call yields to the scheduler once before touching state so that
//! concurrently running tasks interleave the way they would against a
//! remote service.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::adapter::{ChatPlatform, PlatformError};
use super::{Channel, ChannelId, ChannelKind, GuildId, MemberRef, Role, RoleId, UserId};

/// A mutation observed by the memory platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    CreateRole {
        guild: GuildId,
        name: String,
        hoist: bool,
    },
    ReplaceRoles {
        guild: GuildId,
        user: UserId,
        roles: Vec<RoleId>,
    },
    AddRole {
        guild: GuildId,
        user: UserId,
        role: RoleId,
    },
    RemoveRole {
        guild: GuildId,
        user: UserId,
        role: RoleId,
    },
    SendMessage {
        channel: ChannelId,
        text: String,
    },
}

impl PlatformCall {
    /// Whether the call changes a member's role set.
    pub fn is_role_mutation(&self) -> bool {
        matches!(
            self,
            Self::ReplaceRoles { .. } | Self::AddRole { .. } | Self::RemoveRole { .. }
        )
    }
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListRoles,
    ListChannels,
    CurrentRoles,
    CreateRole,
    ReplaceRoles,
    AddRole,
    RemoveRole,
    SendMessage,
}

#[derive(Debug, Default)]
struct GuildData {
    roles: Vec<Role>,
    channels: Vec<Channel>,
    members: HashMap<UserId, Vec<RoleId>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    guilds: HashMap<GuildId, GuildData>,
    next_id: u64,
    calls: Vec<PlatformCall>,
    failing: HashSet<FailPoint>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn guild(&self, guild: GuildId) -> Result<&GuildData, PlatformError> {
        self.guilds
            .get(&guild)
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild)))
    }

    fn guild_mut(&mut self, guild: GuildId) -> Result<&mut GuildData, PlatformError> {
        self.guilds
            .get_mut(&guild)
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild)))
    }

    fn member_roles_mut(&mut self, member: &MemberRef) -> Result<&mut Vec<RoleId>, PlatformError> {
        self.guild_mut(member.guild_id)?
            .members
            .get_mut(&member.user_id)
            .ok_or_else(|| PlatformError::NotFound(format!("member {}", member)))
    }

    fn check(&self, point: FailPoint) -> Result<(), PlatformError> {
        if self.failing.contains(&point) {
            return Err(PlatformError::PermissionDenied(format!(
                "{:?} rejected by memory platform",
                point
            )));
        }
        Ok(())
    }

    fn has_role(&self, guild: GuildId, role: RoleId) -> bool {
        self.guilds
            .get(&guild)
            .map(|g| g.roles.iter().any(|r| r.id == role))
            .unwrap_or(false)
    }
}

/// In-process [`ChatPlatform`] implementation.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Register an empty guild.
    pub fn seed_guild(&self, guild: GuildId) {
        self.state.lock().guilds.entry(guild).or_default();
    }

    /// Define a role on the guild without recording a call.
    pub fn seed_role(&self, guild: GuildId, name: &str, hoist: bool) -> Role {
        let mut state = self.state.lock();
        let role = Role {
            id: RoleId(state.allocate_id()),
            name: name.to_string(),
            hoist,
        };
        state.guilds.entry(guild).or_default().roles.push(role.clone());
        role
    }

    /// Define a channel on the guild.
    pub fn seed_channel(&self, guild: GuildId, name: &str, kind: ChannelKind) -> Channel {
        let mut state = self.state.lock();
        let channel = Channel {
            id: ChannelId(state.allocate_id()),
            guild_id: guild,
            name: name.to_string(),
            kind,
        };
        state
            .guilds
            .entry(guild)
            .or_default()
            .channels
            .push(channel.clone());
        channel
    }

    /// Add a member with no roles.
    pub fn seed_member(&self, guild: GuildId, name: &str) -> MemberRef {
        let mut state = self.state.lock();
        let user = UserId(state.allocate_id());
        state
            .guilds
            .entry(guild)
            .or_default()
            .members
            .insert(user, Vec::new());
        MemberRef::new(guild, user, name)
    }

    /// Overwrite a member's role set directly, as a moderator would.
    pub fn set_member_roles(&self, member: &MemberRef, roles: &[RoleId]) {
        let mut state = self.state.lock();
        state
            .guilds
            .entry(member.guild_id)
            .or_default()
            .members
            .insert(member.user_id, roles.to_vec());
    }

    /// Remove a channel from the guild, returning it.
    pub fn drop_channel(&self, guild: GuildId, channel: ChannelId) -> Option<Channel> {
        let mut state = self.state.lock();
        let data = state.guilds.get_mut(&guild)?;
        let index = data.channels.iter().position(|c| c.id == channel)?;
        Some(data.channels.remove(index))
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn member_roles(&self, member: &MemberRef) -> Vec<RoleId> {
        self.state
            .lock()
            .guilds
            .get(&member.guild_id)
            .and_then(|g| g.members.get(&member.user_id).cloned())
            .unwrap_or_default()
    }

    pub fn roles(&self, guild: GuildId) -> Vec<Role> {
        self.state
            .lock()
            .guilds
            .get(&guild)
            .map(|g| g.roles.clone())
            .unwrap_or_default()
    }

    pub fn roles_named(&self, guild: GuildId, name: &str) -> Vec<Role> {
        self.roles(guild)
            .into_iter()
            .filter(|r| r.name == name)
            .collect()
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of member role mutations (replace/add/remove) recorded.
    pub fn role_mutation_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.is_role_mutation())
            .count()
    }

    pub fn create_role_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, PlatformCall::CreateRole { .. }))
            .count()
    }

    /// Messages sent, in order.
    pub fn sent_messages(&self) -> Vec<(ChannelId, String)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                PlatformCall::SendMessage { channel, text } => Some((*channel, text.clone())),
                _ => None,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Failure injection
    // -----------------------------------------------------------------------

    pub fn fail_on(&self, point: FailPoint) {
        self.state.lock().failing.insert(point);
    }

    pub fn recover(&self, point: FailPoint) {
        self.state.lock().failing.remove(&point);
    }
}

#[async_trait]
impl ChatPlatform for MemoryPlatform {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_roles(&self, guild: GuildId) -> Result<Vec<Role>, PlatformError> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        state.check(FailPoint::ListRoles)?;
        Ok(state.guild(guild)?.roles.clone())
    }

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        state.check(FailPoint::ListChannels)?;
        Ok(state.guild(guild)?.channels.clone())
    }

    async fn current_roles(&self, member: &MemberRef) -> Result<Vec<RoleId>, PlatformError> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        state.check(FailPoint::CurrentRoles)?;
        state
            .guild(member.guild_id)?
            .members
            .get(&member.user_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("member {}", member)))
    }

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        hoist: bool,
    ) -> Result<Role, PlatformError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.check(FailPoint::CreateRole)?;
        state.guild(guild)?;
        let role = Role {
            id: RoleId(state.allocate_id()),
            name: name.to_string(),
            hoist,
        };
        state.guild_mut(guild)?.roles.push(role.clone());
        state.calls.push(PlatformCall::CreateRole {
            guild,
            name: name.to_string(),
            hoist,
        });
        Ok(role)
    }

    async fn replace_roles(
        &self,
        member: &MemberRef,
        roles: &[RoleId],
    ) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.check(FailPoint::ReplaceRoles)?;
        if let Some(missing) = roles.iter().find(|r| !state.has_role(member.guild_id, **r)) {
            return Err(PlatformError::NotFound(format!("role {}", missing)));
        }
        *state.member_roles_mut(member)? = roles.to_vec();
        state.calls.push(PlatformCall::ReplaceRoles {
            guild: member.guild_id,
            user: member.user_id,
            roles: roles.to_vec(),
        });
        Ok(())
    }

    async fn add_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.check(FailPoint::AddRole)?;
        if !state.has_role(member.guild_id, role) {
            return Err(PlatformError::NotFound(format!("role {}", role)));
        }
        let roles = state.member_roles_mut(member)?;
        if !roles.contains(&role) {
            roles.push(role);
        }
        state.calls.push(PlatformCall::AddRole {
            guild: member.guild_id,
            user: member.user_id,
            role,
        });
        Ok(())
    }

    async fn remove_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.check(FailPoint::RemoveRole)?;
        state.member_roles_mut(member)?.retain(|r| *r != role);
        state.calls.push(PlatformCall::RemoveRole {
            guild: member.guild_id,
            user: member.user_id,
            role,
        });
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.check(FailPoint::SendMessage)?;
        state.calls.push(PlatformCall::SendMessage {
            channel,
            text: text.to_string(),
        });
        Ok(())
    }
}
