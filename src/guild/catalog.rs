//! Role catalog: resolves configured bias names to live guild roles.
//!
//! Each bias name owns two roles: the exclusive "bias" role, displayed as the
//! capitalized name and hoisted, and the non-exclusive "sub-bias" role,
//! displayed as the lowercase name. Missing roles are created during
//! [`RoleCatalog::sync`]; existing ones are reused by exact name.

use std::fmt;

use tracing::{debug, info};

use crate::error::RoleProvisionError;
use crate::platform::{ChatPlatform, GuildId, Role, RoleId};

/// Canonical lowercase bias key, e.g. `alice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BiasName(String);

impl BiasName {
    /// Normalize a configured or typed name.
    ///
    /// Returns `None` for names whose exclusive and sub display forms would
    /// be identical (empty, or starting with a character without case).
    pub fn parse(raw: &str) -> Option<Self> {
        let name = Self(raw.to_lowercase());
        if name.exclusive_display() == name.sub_display() {
            return None;
        }
        Some(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display name of the exclusive role: first letter upper-cased.
    pub fn exclusive_display(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Display name of the sub role: the key itself.
    pub fn sub_display(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BiasName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role pair resolved for one bias name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: BiasName,
    pub exclusive: Role,
    pub sub: Role,
}

/// Bias name → role pair mapping for one guild, in configuration order.
///
/// Immutable once built. A reconnect builds a new catalog instead of
/// patching the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    entries: Vec<CatalogEntry>,
}

impl RoleCatalog {
    /// Resolve every name against the guild's roles, creating what is missing.
    ///
    /// Fails fast: the first lookup or creation error aborts the whole sync
    /// and no catalog is produced.
    pub async fn sync(
        platform: &dyn ChatPlatform,
        guild: GuildId,
        names: &[BiasName],
    ) -> Result<Self, RoleProvisionError> {
        let mut known = platform
            .list_roles(guild)
            .await
            .map_err(|source| RoleProvisionError::Lookup { guild, source })?;

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let exclusive =
                find_or_create(platform, guild, &mut known, &name.exclusive_display(), true)
                    .await?;
            let sub = find_or_create(platform, guild, &mut known, name.sub_display(), false).await?;
            entries.push(CatalogEntry {
                name: name.clone(),
                exclusive,
                sub,
            });
        }

        info!(guild = %guild, biases = entries.len(), "Role catalog ready");
        Ok(Self { entries })
    }

    /// Look up a bias by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        let name = name.to_lowercase();
        self.entries.iter().find(|e| e.name.as_str() == name)
    }

    /// Whether `role` is the exclusive role of any bias.
    pub fn is_exclusive(&self, role: RoleId) -> bool {
        self.entries.iter().any(|e| e.exclusive.id == role)
    }

    /// The first bias, in catalog order, whose exclusive role is in `roles`.
    pub fn current_bias(&self, roles: &[RoleId]) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| roles.contains(&e.exclusive.id))
    }

    /// Number of exclusive roles from this catalog present in `roles`.
    pub fn exclusive_count(&self, roles: &[RoleId]) -> usize {
        roles.iter().filter(|r| self.is_exclusive(**r)).count()
    }
}

async fn find_or_create(
    platform: &dyn ChatPlatform,
    guild: GuildId,
    known: &mut Vec<Role>,
    role_name: &str,
    hoist: bool,
) -> Result<Role, RoleProvisionError> {
    if let Some(role) = known.iter().find(|r| r.name == role_name) {
        return Ok(role.clone());
    }

    debug!(guild = %guild, role = role_name, hoist, "Creating role");
    let role = platform
        .create_role(guild, role_name, hoist)
        .await
        .map_err(|source| RoleProvisionError::Create {
            guild,
            role: role_name.to_string(),
            source,
        })?;
    known.push(role.clone());
    Ok(role)
}
