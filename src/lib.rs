//! # fanman
//!
//! A chat bot that lets guild members pick a bias (one exclusive, hoisted
//! role) and any number of sub-biases (plain roles) from a configured list,
//! announces members joining and leaving, and keeps per-guild state across
//! gateway reconnects.
//!
//! The core is platform independent: adapters implement
//! [`platform::ChatPlatform`] and feed [`platform::PlatformEvent`]s into an
//! [`router::EventRouter`]. The Discord adapter lives behind the `discord`
//! feature.

pub mod bias;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod guild;
pub mod logging;
pub mod platform;
pub mod router;

pub use bias::{BiasEngine, BiasOutcome};
pub use commands::{Command, CommandDispatcher};
pub use config::{BotConfig, ConfigError};
pub use error::{ChannelResolutionError, RoleMutationError, RoleProvisionError};
pub use guild::{GuildRegistry, RoleCatalog};
pub use platform::{ChatPlatform, MemoryPlatform, PlatformError, PlatformEvent};
pub use router::{ConnectionState, EventRouter, RouterSettings};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
