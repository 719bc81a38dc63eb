//! Results of bias operations and their reply text.

use crate::guild::BiasName;
use crate::platform::MemberRef;

/// What a bias operation did, or found already done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiasOutcome {
    /// Member had no bias; it is now `bias`.
    BiasSet { bias: BiasName },
    /// Member's bias moved from `from` to `to`.
    BiasChanged { from: BiasName, to: BiasName },
    /// Member already had `bias`.
    BiasUnchanged { bias: BiasName },
    /// Member's bias role was removed.
    BiasRemoved { bias: BiasName },
    /// Member had no bias to remove.
    NoBias,
    SubBiasSet { name: BiasName },
    SubBiasAlreadyHeld { name: BiasName },
    SubBiasRemoved { name: BiasName },
    SubBiasNotHeld { name: BiasName },
}

impl BiasOutcome {
    /// Whether the operation changed the member's roles.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::BiasSet { .. }
                | Self::BiasChanged { .. }
                | Self::BiasRemoved { .. }
                | Self::SubBiasSet { .. }
                | Self::SubBiasRemoved { .. }
        )
    }

    /// Reply text addressed to `member`.
    pub fn render(&self, member: &MemberRef) -> String {
        let mention = member.mention();
        match self {
            Self::BiasSet { bias } => {
                format!("{} set bias to {}.", mention, bias.exclusive_display())
            }
            Self::BiasChanged { from, to } => {
                format!("{} changed bias from {} to {}.", mention, from, to)
            }
            Self::BiasUnchanged { bias } => {
                format!("{} bias is already {}.", mention, bias.exclusive_display())
            }
            Self::BiasRemoved { bias } => {
                format!("{} removed {} bias.", mention, bias.exclusive_display())
            }
            Self::NoBias => format!("{} you do not have a bias set.", mention),
            Self::SubBiasSet { name } => {
                format!("{} set sub-bias to {}.", mention, name.exclusive_display())
            }
            Self::SubBiasAlreadyHeld { name } => {
                format!("{} already has sub-bias {}.", mention, name.exclusive_display())
            }
            Self::SubBiasRemoved { name } => {
                format!("{} removed {} sub-bias.", mention, name.exclusive_display())
            }
            Self::SubBiasNotHeld { name } => {
                format!(
                    "{} you do not have a sub-bias {}.",
                    mention,
                    name.exclusive_display()
                )
            }
        }
    }
}
