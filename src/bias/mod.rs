//! # Bias assignment engine
//!
//! Moves members between bias roles. A member holds at most one exclusive
//! bias role from the guild's catalog and any number of sub-bias roles.
//!
//! Every operation runs inside the member's lease from [`MemberLocks`]:
//!
//! ```text
//! acquire lease ─► read live roles ─► compute change ─► one platform call ─► release
//! ```
//!
//! Switching bias replaces the whole role set in one call, so the member is
//! never seen holding zero or two exclusive roles in between. Two commands
//! racing for the same member are applied one after the other, each against
//! the roles the previous one left behind.

pub mod locks;
pub mod outcome;

pub use locks::{MemberLease, MemberLocks};
pub use outcome::BiasOutcome;

use std::sync::Arc;

use tracing::debug;

use crate::error::{MutationKind, RoleMutationError};
use crate::guild::{GuildRegistry, RoleCatalog};
use crate::platform::{ChatPlatform, MemberRef, PlatformError, Role, RoleId};

/// `Ok(None)` means the request was ignored: no catalog for the guild or an
/// unknown bias name. Nothing was changed and nothing should be replied.
pub type BiasResult = Result<Option<BiasOutcome>, RoleMutationError>;

pub struct BiasEngine {
    platform: Arc<dyn ChatPlatform>,
    guilds: Arc<GuildRegistry>,
    locks: MemberLocks,
}

impl BiasEngine {
    pub fn new(platform: Arc<dyn ChatPlatform>, guilds: Arc<GuildRegistry>) -> Self {
        Self {
            platform,
            guilds,
            locks: MemberLocks::new(),
        }
    }

    /// Make `name` the member's only bias.
    pub async fn set_bias(&self, member: &MemberRef, name: &str) -> BiasResult {
        let Some(catalog) = self.catalog(member, "bias") else {
            return Ok(None);
        };
        let Some(target) = catalog.get(name) else {
            debug!(guild = %member.guild_id, name, "Ignoring unknown bias");
            return Ok(None);
        };

        let _lease = self.locks.acquire(member).await;
        let roles = self.live_roles(member, &target.exclusive).await?;

        match catalog.current_bias(&roles) {
            Some(current) if current.name == target.name => {
                if catalog.exclusive_count(&roles) > 1 {
                    // Stray exclusive roles assigned outside the bot.
                    let next = replace_exclusive(&catalog, &roles, target.exclusive.id);
                    debug!(member = %member, bias = %target.name, "Dropping extra bias roles");
                    self.replace(member, &next, &target.exclusive).await?;
                }
                Ok(Some(BiasOutcome::BiasUnchanged {
                    bias: target.name.clone(),
                }))
            }
            Some(current) => {
                let next = replace_exclusive(&catalog, &roles, target.exclusive.id);
                debug!(
                    member = %member,
                    from = %current.exclusive.name,
                    to = %target.exclusive.name,
                    "Replacing bias role"
                );
                self.replace(member, &next, &target.exclusive).await?;
                Ok(Some(BiasOutcome::BiasChanged {
                    from: current.name.clone(),
                    to: target.name.clone(),
                }))
            }
            None => {
                debug!(member = %member, role = %target.exclusive.name, "Adding bias role");
                self.platform
                    .add_role(member, target.exclusive.id)
                    .await
                    .map_err(|source| {
                        mutation_error(member, MutationKind::Add, &target.exclusive, source)
                    })?;
                Ok(Some(BiasOutcome::BiasSet {
                    bias: target.name.clone(),
                }))
            }
        }
    }

    /// Give the member the sub-bias role for `name`.
    pub async fn set_sub_bias(&self, member: &MemberRef, name: &str) -> BiasResult {
        let Some(catalog) = self.catalog(member, "sbias") else {
            return Ok(None);
        };
        let Some(target) = catalog.get(name) else {
            debug!(guild = %member.guild_id, name, "Ignoring unknown sub-bias");
            return Ok(None);
        };

        let _lease = self.locks.acquire(member).await;
        let roles = self.live_roles(member, &target.sub).await?;
        if roles.contains(&target.sub.id) {
            return Ok(Some(BiasOutcome::SubBiasAlreadyHeld {
                name: target.name.clone(),
            }));
        }

        debug!(member = %member, role = %target.sub.name, "Adding sub-bias role");
        self.platform
            .add_role(member, target.sub.id)
            .await
            .map_err(|source| mutation_error(member, MutationKind::Add, &target.sub, source))?;
        Ok(Some(BiasOutcome::SubBiasSet {
            name: target.name.clone(),
        }))
    }

    /// Remove the member's current bias role.
    pub async fn clear_bias(&self, member: &MemberRef) -> BiasResult {
        let Some(catalog) = self.catalog(member, "unbias") else {
            return Ok(None);
        };

        let _lease = self.locks.acquire(member).await;
        let roles = self
            .platform
            .current_roles(member)
            .await
            .map_err(|source| RoleMutationError {
                guild: member.guild_id,
                user: member.user_id,
                kind: MutationKind::ReadRoles,
                role: String::new(),
                source,
            })?;

        let Some(current) = catalog.current_bias(&roles) else {
            return Ok(Some(BiasOutcome::NoBias));
        };

        debug!(member = %member, role = %current.exclusive.name, "Removing bias role");
        self.platform
            .remove_role(member, current.exclusive.id)
            .await
            .map_err(|source| {
                mutation_error(member, MutationKind::Remove, &current.exclusive, source)
            })?;
        Ok(Some(BiasOutcome::BiasRemoved {
            bias: current.name.clone(),
        }))
    }

    /// Take the sub-bias role for `name` away from the member.
    pub async fn clear_sub_bias(&self, member: &MemberRef, name: &str) -> BiasResult {
        let Some(catalog) = self.catalog(member, "unsbias") else {
            return Ok(None);
        };
        let Some(target) = catalog.get(name) else {
            debug!(guild = %member.guild_id, name, "Ignoring unknown sub-bias");
            return Ok(None);
        };

        let _lease = self.locks.acquire(member).await;
        let roles = self.live_roles(member, &target.sub).await?;
        if !roles.contains(&target.sub.id) {
            return Ok(Some(BiasOutcome::SubBiasNotHeld {
                name: target.name.clone(),
            }));
        }

        debug!(member = %member, role = %target.sub.name, "Removing sub-bias role");
        self.platform
            .remove_role(member, target.sub.id)
            .await
            .map_err(|source| mutation_error(member, MutationKind::Remove, &target.sub, source))?;
        Ok(Some(BiasOutcome::SubBiasRemoved {
            name: target.name.clone(),
        }))
    }

    fn catalog(&self, member: &MemberRef, command: &str) -> Option<Arc<RoleCatalog>> {
        let catalog = self.guilds.catalog(member.guild_id);
        if catalog.is_none() {
            debug!(guild = %member.guild_id, command, "No role catalog for guild, ignoring");
        }
        catalog
    }

    async fn live_roles(
        &self,
        member: &MemberRef,
        role: &Role,
    ) -> Result<Vec<RoleId>, RoleMutationError> {
        self.platform
            .current_roles(member)
            .await
            .map_err(|source| mutation_error(member, MutationKind::ReadRoles, role, source))
    }

    async fn replace(
        &self,
        member: &MemberRef,
        roles: &[RoleId],
        target: &Role,
    ) -> Result<(), RoleMutationError> {
        self.platform
            .replace_roles(member, roles)
            .await
            .map_err(|source| mutation_error(member, MutationKind::Replace, target, source))
    }
}

/// `roles` without any exclusive role from `catalog`, plus `target`.
fn replace_exclusive(catalog: &RoleCatalog, roles: &[RoleId], target: RoleId) -> Vec<RoleId> {
    roles
        .iter()
        .copied()
        .filter(|role| !catalog.is_exclusive(*role))
        .chain(std::iter::once(target))
        .collect()
}

fn mutation_error(
    member: &MemberRef,
    kind: MutationKind,
    role: &Role,
    source: PlatformError,
) -> RoleMutationError {
    RoleMutationError {
        guild: member.guild_id,
        user: member.user_id,
        kind,
        role: role.name.clone(),
        source,
    }
}
