//! Channel registry: tracks a guild's "general" and "updates" channels.
//!
//! Slots are matched by exact, case-sensitive equality between a text
//! channel's name and the configured name with its leading `#` removed.

use crate::error::ChannelResolutionError;
use crate::platform::{Channel, GuildId};

/// Configured channel names, `#` already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub general: String,
    pub updates: String,
}

impl ChannelNames {
    pub fn new(general: &str, updates: &str) -> Self {
        Self {
            general: general.trim_start_matches('#').to_string(),
            updates: updates.trim_start_matches('#').to_string(),
        }
    }

    fn matches(&self, slot: ChannelSlot, channel: &Channel) -> bool {
        channel.is_text()
            && match slot {
                ChannelSlot::General => channel.name == self.general,
                ChannelSlot::Updates => channel.name == self.updates,
            }
    }

    fn name(&self, slot: ChannelSlot) -> &str {
        match slot {
            ChannelSlot::General => &self.general,
            ChannelSlot::Updates => &self.updates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSlot {
    General,
    Updates,
}

impl ChannelSlot {
    pub const ALL: [ChannelSlot; 2] = [ChannelSlot::General, ChannelSlot::Updates];
}

/// The two tracked channels of one guild, each optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    general: Option<Channel>,
    updates: Option<Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild both slots from a full channel listing.
    ///
    /// Returns one error per slot left unresolved.
    pub fn on_ready(
        &mut self,
        guild: GuildId,
        names: &ChannelNames,
        channels: &[Channel],
    ) -> Vec<ChannelResolutionError> {
        *self = Self::default();
        for channel in channels {
            self.on_channel_created(names, channel);
        }

        ChannelSlot::ALL
            .into_iter()
            .filter(|slot| self.get(*slot).is_none())
            .map(|slot| ChannelResolutionError {
                guild,
                name: names.name(slot).to_string(),
            })
            .collect()
    }

    /// Point every slot whose name matches at `channel`. Returns the slots set.
    pub fn on_channel_created(&mut self, names: &ChannelNames, channel: &Channel) -> Vec<ChannelSlot> {
        let mut updated = Vec::new();
        for slot in ChannelSlot::ALL {
            if names.matches(slot, channel) {
                *self.slot_mut(slot) = Some(channel.clone());
                updated.push(slot);
            }
        }
        updated
    }

    /// Clear every slot that points at `channel`. Returns the slots cleared.
    pub fn on_channel_deleted(&mut self, channel: &Channel) -> Vec<ChannelSlot> {
        let mut cleared = Vec::new();
        if !channel.is_text() {
            return cleared;
        }
        for slot in ChannelSlot::ALL {
            let entry = self.slot_mut(slot);
            if entry.as_ref().map(|c| c.id) == Some(channel.id) {
                *entry = None;
                cleared.push(slot);
            }
        }
        cleared
    }

    pub fn get(&self, slot: ChannelSlot) -> Option<&Channel> {
        match slot {
            ChannelSlot::General => self.general.as_ref(),
            ChannelSlot::Updates => self.updates.as_ref(),
        }
    }

    pub fn general(&self) -> Option<&Channel> {
        self.general.as_ref()
    }

    pub fn updates(&self) -> Option<&Channel> {
        self.updates.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn slot_mut(&mut self, slot: ChannelSlot) -> &mut Option<Channel> {
        match slot {
            ChannelSlot::General => &mut self.general,
            ChannelSlot::Updates => &mut self.updates,
        }
    }
}
