//! # Per-guild state
//!
//! Every guild the bot sees gets one [`GuildState`] in the [`GuildRegistry`].
//! The state object owns the guild's role catalog, its channel registry and
//! the provisioning phase that decides whether incoming guild events are
//! applied right away or held until provisioning finishes.
//!
//! ```text
//! GuildRegistry
//!   └── GuildId → GuildState
//!         ├── catalog   : Option<Arc<RoleCatalog>>   (swapped whole, never patched)
//!         ├── channels  : ChannelRegistry
//!         ├── phase     : Waiting | Syncing(epoch) | Ready(epoch)   + held events
//!         └── provision : one provisioning pass at a time
//! ```

pub mod catalog;
pub mod channels;

pub use catalog::{BiasName, CatalogEntry, RoleCatalog};
pub use channels::{ChannelNames, ChannelRegistry, ChannelSlot};

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use crate::platform::{Channel, GuildEvent, GuildId};

/// Upper bound on events held for a guild that is not ready yet.
pub const MAX_HELD_EVENTS: usize = 512;

/// Provisioning phase of one guild.
#[derive(Debug)]
pub enum GuildPhase {
    /// Not provisioned in the current session.
    Waiting { held: VecDeque<GuildEvent> },
    /// A provisioning pass for `epoch` is running.
    Syncing { epoch: u64, held: VecDeque<GuildEvent> },
    /// Provisioned for `epoch`; events are applied directly.
    Ready { epoch: u64 },
}

impl Default for GuildPhase {
    fn default() -> Self {
        Self::Waiting {
            held: VecDeque::new(),
        }
    }
}

impl GuildPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Session the phase is syncing or ready for.
    pub fn epoch(&self) -> Option<u64> {
        match self {
            Self::Waiting { .. } => None,
            Self::Syncing { epoch, .. } | Self::Ready { epoch } => Some(*epoch),
        }
    }

    /// Queue `event` for replay. Returns the event back if the phase is
    /// ready and it should be applied now instead.
    ///
    /// Past [`MAX_HELD_EVENTS`] the oldest held event is dropped.
    pub fn hold(&mut self, event: GuildEvent) -> Option<GuildEvent> {
        let held = match self {
            Self::Ready { .. } => return Some(event),
            Self::Waiting { held } | Self::Syncing { held, .. } => held,
        };
        if held.len() >= MAX_HELD_EVENTS {
            if let Some(dropped) = held.pop_front() {
                tracing::warn!(
                    guild = %dropped.guild_id(),
                    kind = dropped.kind(),
                    "Held event queue full, dropping oldest event"
                );
            }
        }
        held.push_back(event);
        None
    }

    /// Start a provisioning pass, carrying held events over.
    pub fn begin(&mut self, epoch: u64) {
        let held = self.take_held();
        *self = Self::Syncing { epoch, held };
    }

    /// Finish the pass started for `epoch`. Returns the events to replay, or
    /// `None` if the phase moved on in the meantime.
    pub fn finish(&mut self, epoch: u64) -> Option<Vec<GuildEvent>> {
        let running = match self {
            Self::Syncing { epoch: current, .. } => *current,
            _ => return None,
        };
        if running != epoch {
            return None;
        }
        let held = self.take_held();
        *self = Self::Ready { epoch };
        Some(held.into())
    }

    /// Back to waiting, keeping held events.
    pub fn reset(&mut self) {
        let held = self.take_held();
        *self = Self::Waiting { held };
    }

    pub fn held_len(&self) -> usize {
        match self {
            Self::Waiting { held } | Self::Syncing { held, .. } => held.len(),
            Self::Ready { .. } => 0,
        }
    }

    fn take_held(&mut self) -> VecDeque<GuildEvent> {
        match self {
            Self::Waiting { held } | Self::Syncing { held, .. } => std::mem::take(held),
            Self::Ready { .. } => VecDeque::new(),
        }
    }
}

/// Everything the bot knows about one guild.
#[derive(Debug)]
pub struct GuildState {
    id: GuildId,
    catalog: RwLock<Option<Arc<RoleCatalog>>>,
    channels: RwLock<ChannelRegistry>,
    phase: Mutex<GuildPhase>,
    provision: Mutex<()>,
}

impl GuildState {
    pub fn new(id: GuildId) -> Self {
        Self {
            id,
            catalog: RwLock::new(None),
            channels: RwLock::new(ChannelRegistry::new()),
            phase: Mutex::new(GuildPhase::default()),
            provision: Mutex::new(()),
        }
    }

    pub fn id(&self) -> GuildId {
        self.id
    }

    /// The catalog of the current session, if provisioning succeeded.
    pub fn catalog(&self) -> Option<Arc<RoleCatalog>> {
        self.catalog.read().clone()
    }

    pub fn set_catalog(&self, catalog: Option<RoleCatalog>) {
        *self.catalog.write() = catalog.map(Arc::new);
    }

    pub fn general_channel(&self) -> Option<Channel> {
        self.channels.read().general().cloned()
    }

    pub fn updates_channel(&self) -> Option<Channel> {
        self.channels.read().updates().cloned()
    }

    /// Run `f` with exclusive access to the channel registry.
    pub fn update_channels<R>(&self, f: impl FnOnce(&mut ChannelRegistry) -> R) -> R {
        f(&mut self.channels.write())
    }

    /// Drop catalog and channels. Held events survive.
    pub fn clear(&self) {
        *self.catalog.write() = None;
        self.channels.write().clear();
    }

    pub async fn phase(&self) -> MutexGuard<'_, GuildPhase> {
        self.phase.lock().await
    }

    /// Serializes provisioning passes for this guild.
    pub async fn provisioning(&self) -> MutexGuard<'_, ()> {
        self.provision.lock().await
    }
}

/// Guild identity → state.
#[derive(Debug, Default)]
pub struct GuildRegistry {
    guilds: DashMap<GuildId, Arc<GuildState>>,
}

impl GuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: GuildId) -> Option<Arc<GuildState>> {
        self.guilds.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_or_insert(&self, id: GuildId) -> Arc<GuildState> {
        Arc::clone(
            self.guilds
                .entry(id)
                .or_insert_with(|| Arc::new(GuildState::new(id)))
                .value(),
        )
    }

    pub fn remove(&self, id: GuildId) -> Option<Arc<GuildState>> {
        self.guilds.remove(&id).map(|(_, state)| state)
    }

    /// Shortcut for the guild's current catalog.
    pub fn catalog(&self, id: GuildId) -> Option<Arc<RoleCatalog>> {
        self.get(id).and_then(|state| state.catalog())
    }

    /// Snapshot of all guild states.
    pub fn states(&self) -> Vec<Arc<GuildState>> {
        self.guilds
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn ids(&self) -> Vec<GuildId> {
        self.guilds.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}
