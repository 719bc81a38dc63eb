//! # Event router
//!
//! Receives [`PlatformEvent`]s from an adapter and drives everything else.
//!
//! ```text
//!                 Connecting            Ready
//!  Disconnected ─────────────► Connecting ─────► Ready
//!       ▲                                          │
//!       └──────────────── Disconnected ◄───────────┘
//! ```
//!
//! `Connecting` while `Ready` is a stale stage report and is ignored; only
//! `Disconnected` ends a session.
//!
//! Entering `Ready` starts a new epoch and provisions every guild in its own
//! task: role catalog sync and channel scan run side by side, and a failure
//! in one guild leaves the others alone. Guild events that arrive before
//! their guild finished provisioning are held by the guild's phase and
//! replayed, in arrival order, once it has.
//!
//! Disconnecting bumps the epoch, aborts provisioning still in flight and
//! clears every guild. Results of an aborted or superseded pass are dropped,
//! never merged into the next session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::bias::BiasEngine;
use crate::commands::CommandDispatcher;
use crate::config::{BotConfig, MENTION_PLACEHOLDER};
use crate::guild::{BiasName, ChannelNames, GuildRegistry, GuildState, RoleCatalog};
use crate::platform::{
    ChatPlatform, CommandInvocation, GuildEvent, GuildId, MemberRef, PlatformEvent,
};

/// Gateway connection state as seen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

impl ConnectionState {
    /// State after `event`. Events that do not touch the connection keep it.
    pub fn next(self, event: &PlatformEvent) -> Self {
        match (self, event) {
            (_, PlatformEvent::Disconnected) => Self::Disconnected,
            (Self::Ready, PlatformEvent::Connecting) => Self::Ready,
            (_, PlatformEvent::Connecting) => Self::Connecting,
            (_, PlatformEvent::Ready { .. }) => Self::Ready,
            (state, _) => state,
        }
    }
}

/// The parts of [`BotConfig`] the router works with, normalized once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    pub bias_names: Vec<BiasName>,
    pub channel_names: ChannelNames,
    pub join_message: Option<String>,
    pub part_message: Option<String>,
}

impl RouterSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        let template = |t: &Option<String>| t.clone().filter(|t| !t.is_empty());
        Self {
            bias_names: config.bias_names(),
            channel_names: config.channel_names(),
            join_message: template(&config.join_message),
            part_message: template(&config.part_message),
        }
    }
}

/// Substitute the member mention into a join/part template.
pub fn render_template(template: &str, mention: &str) -> String {
    template.replace(MENTION_PLACEHOLDER, mention)
}

pub struct EventRouter {
    platform: Arc<dyn ChatPlatform>,
    settings: RouterSettings,
    guilds: Arc<GuildRegistry>,
    dispatcher: CommandDispatcher,
    connection: Mutex<ConnectionState>,
    epoch: AtomicU64,
    provisioning: Mutex<Vec<AbortHandle>>,
}

impl EventRouter {
    pub fn new(platform: Arc<dyn ChatPlatform>, settings: RouterSettings) -> Self {
        let guilds = Arc::new(GuildRegistry::new());
        let engine = BiasEngine::new(Arc::clone(&platform), Arc::clone(&guilds));
        Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&guilds), engine),
            platform,
            settings,
            guilds,
            connection: Mutex::new(ConnectionState::Disconnected),
            epoch: AtomicU64::new(0),
            provisioning: Mutex::new(Vec::new()),
        }
    }

    pub fn guilds(&self) -> &Arc<GuildRegistry> {
        &self.guilds
    }

    pub fn connection(&self) -> ConnectionState {
        *self.connection.lock()
    }

    /// Current session counter.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Process one event to completion.
    ///
    /// `Ready` returns once every guild finished provisioning (or was
    /// aborted by a disconnect).
    pub async fn handle(self: &Arc<Self>, event: PlatformEvent) {
        self.transition(&event);
        match event {
            PlatformEvent::Connecting => {}
            PlatformEvent::Ready { guilds } => self.on_ready(guilds).await,
            PlatformEvent::Disconnected => self.teardown().await,
            PlatformEvent::GuildAvailable(guild) => self.on_guild_available(guild).await,
            PlatformEvent::GuildRemoved(guild) => {
                if self.guilds.remove(guild).is_some() {
                    info!(guild = %guild, "Left guild");
                }
            }
            PlatformEvent::Guild(event) => self.on_guild_event(event).await,
            PlatformEvent::Command(invocation) => self.on_command(invocation).await,
        }
    }

    fn transition(&self, event: &PlatformEvent) {
        let mut connection = self.connection.lock();
        let previous = *connection;
        *connection = previous.next(event);
        if *connection != previous {
            debug!(from = ?previous, to = ?*connection, "Connection state changed");
        }
    }

    async fn on_ready(self: &Arc<Self>, guilds: Vec<GuildId>) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            platform = self.platform.name(),
            guilds = guilds.len(),
            epoch,
            "Session ready, provisioning guilds"
        );

        for known in self.guilds.ids() {
            if !guilds.contains(&known) {
                debug!(guild = %known, "Dropping guild absent from session");
                self.guilds.remove(known);
            }
        }

        let passes: Vec<_> = guilds
            .into_iter()
            .map(|guild| self.spawn_provision(guild, epoch))
            .collect();
        for pass in futures::future::join_all(passes).await {
            if let Err(err) = pass {
                if err.is_panic() {
                    error!(error = %err, "Guild provisioning panicked");
                } else {
                    debug!("Guild provisioning aborted");
                }
            }
        }
    }

    async fn on_guild_available(self: &Arc<Self>, guild: GuildId) {
        if self.connection() != ConnectionState::Ready {
            return;
        }
        let epoch = self.epoch();
        if let Some(state) = self.guilds.get(guild) {
            if state.phase().await.epoch() == Some(epoch) {
                return;
            }
        }
        info!(guild = %guild, "Guild became available");
        if let Err(err) = self.spawn_provision(guild, epoch).await {
            if err.is_panic() {
                error!(guild = %guild, error = %err, "Guild provisioning panicked");
            }
        }
    }

    fn spawn_provision(self: &Arc<Self>, guild: GuildId, epoch: u64) -> JoinHandle<()> {
        // Registered before the task runs so events for the guild are held.
        self.guilds.get_or_insert(guild);
        let router = Arc::clone(self);
        let handle = tokio::spawn(async move { router.provision(guild, epoch).await });
        let mut running = self.provisioning.lock();
        running.retain(|h| !h.is_finished());
        running.push(handle.abort_handle());
        handle
    }

    /// One provisioning pass for `guild` in session `epoch`.
    async fn provision(&self, guild: GuildId, epoch: u64) {
        let Some(state) = self.guilds.get(guild) else {
            debug!(guild = %guild, "Guild removed before provisioning");
            return;
        };
        let _pass = state.provisioning().await;

        {
            let mut phase = state.phase().await;
            if self.epoch() != epoch || phase.epoch() == Some(epoch) {
                return;
            }
            state.clear();
            phase.begin(epoch);
        }

        let (catalog, channels) = tokio::join!(
            RoleCatalog::sync(self.platform.as_ref(), guild, &self.settings.bias_names),
            self.platform.list_channels(guild),
        );

        let mut phase = state.phase().await;
        if self.epoch() != epoch {
            debug!(guild = %guild, epoch, "Discarding provisioning of an old session");
            return;
        }

        match catalog {
            Ok(catalog) => state.set_catalog(Some(catalog)),
            Err(err) => {
                error!(
                    guild = %err.guild(),
                    platform = self.platform.name(),
                    error = %err,
                    "Bias roles disabled for guild until reconnect"
                );
            }
        }
        match channels {
            Ok(channels) => {
                let names = &self.settings.channel_names;
                let unresolved = state.update_channels(|r| r.on_ready(guild, names, &channels));
                for err in unresolved {
                    info!(error = %err, "Channel not found");
                }
            }
            Err(err) => warn!(guild = %guild, error = %err, "Failed to list channels"),
        }

        let Some(held) = phase.finish(epoch) else {
            return;
        };
        if !held.is_empty() {
            debug!(guild = %guild, events = held.len(), "Replaying held events");
        }
        for event in held {
            self.apply(&state, event).await;
        }
    }

    /// Leave the session: abort provisioning and forget per-session state.
    async fn teardown(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(platform = self.platform.name(), epoch, "Session lost");
        for handle in self.provisioning.lock().drain(..) {
            handle.abort();
        }
        for state in self.guilds.states() {
            let mut phase = state.phase().await;
            state.clear();
            phase.reset();
        }
    }

    async fn on_guild_event(&self, event: GuildEvent) {
        let guild = event.guild_id();
        // Outside a session every guild may still show up in the next ready.
        let state = if self.connection() == ConnectionState::Ready {
            let Some(state) = self.guilds.get(guild) else {
                debug!(guild = %guild, kind = event.kind(), "Dropping event for unknown guild");
                return;
            };
            state
        } else {
            self.guilds.get_or_insert(guild)
        };
        let mut phase = state.phase().await;
        let Some(event) = phase.hold(event) else {
            debug!(guild = %state.id(), "Guild not provisioned yet, holding event");
            return;
        };
        drop(phase);
        self.apply(&state, event).await;
    }

    async fn apply(&self, state: &GuildState, event: GuildEvent) {
        let guild = state.id();
        match event {
            GuildEvent::ChannelCreated(channel) => {
                let names = &self.settings.channel_names;
                let slots = state.update_channels(|r| r.on_channel_created(names, &channel));
                if !slots.is_empty() {
                    info!(guild = %guild, channel = %channel.name, slots = ?slots, "Tracking channel");
                }
            }
            GuildEvent::ChannelDeleted(channel) => {
                let slots = state.update_channels(|r| r.on_channel_deleted(&channel));
                if !slots.is_empty() {
                    info!(guild = %guild, channel = %channel.name, slots = ?slots, "Tracked channel deleted");
                }
            }
            GuildEvent::MemberJoined(member) => {
                let template = self.settings.join_message.as_deref();
                self.announce(state, &member, template, "joined").await;
            }
            GuildEvent::MemberRemoved(member) => {
                let template = self.settings.part_message.as_deref();
                self.announce(state, &member, template, "left").await;
            }
        }
    }

    async fn announce(
        &self,
        state: &GuildState,
        member: &MemberRef,
        template: Option<&str>,
        action: &str,
    ) {
        let (Some(template), Some(channel)) = (template, state.general_channel()) else {
            return;
        };
        debug!(member = %member, guild = %state.id(), action, "Announcing member");
        let text = render_template(template, &member.mention());
        if let Err(err) = self.platform.send_message(channel.id, &text).await {
            warn!(guild = %state.id(), channel = %channel.name, error = %err, "Failed to announce member");
        }
    }

    async fn on_command(&self, invocation: CommandInvocation) {
        let Some(reply) = self.dispatcher.dispatch(&invocation).await else {
            return;
        };
        if let Err(err) = self.platform.send_message(invocation.channel, &reply).await {
            warn!(
                guild = %invocation.guild_id(),
                channel = %invocation.channel,
                error = %err,
                "Failed to send reply"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::platform::{
        Channel, ChannelId, ChannelKind, FailPoint, MemoryPlatform, PlatformError, Role, RoleId,
    };

    /// Memory platform whose `list_roles` parks until the gate opens.
    struct GatedPlatform {
        inner: Arc<MemoryPlatform>,
        gated: AtomicBool,
        entered: Notify,
        gate: Notify,
    }

    impl GatedPlatform {
        fn new(inner: Arc<MemoryPlatform>) -> Self {
            Self {
                inner,
                gated: AtomicBool::new(true),
                entered: Notify::new(),
                gate: Notify::new(),
            }
        }

        fn open(&self) {
            self.gated.store(false, Ordering::SeqCst);
            self.gate.notify_waiters();
        }
    }

    #[async_trait]
    impl ChatPlatform for GatedPlatform {
        fn name(&self) -> &str {
            "gated"
        }

        async fn list_roles(&self, guild: GuildId) -> Result<Vec<Role>, PlatformError> {
            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            self.inner.list_roles(guild).await
        }

        async fn list_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError> {
            self.inner.list_channels(guild).await
        }

        async fn current_roles(&self, member: &MemberRef) -> Result<Vec<RoleId>, PlatformError> {
            self.inner.current_roles(member).await
        }

        async fn create_role(
            &self,
            guild: GuildId,
            name: &str,
            hoist: bool,
        ) -> Result<Role, PlatformError> {
            self.inner.create_role(guild, name, hoist).await
        }

        async fn replace_roles(
            &self,
            member: &MemberRef,
            roles: &[RoleId],
        ) -> Result<(), PlatformError> {
            self.inner.replace_roles(member, roles).await
        }

        async fn add_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError> {
            self.inner.add_role(member, role).await
        }

        async fn remove_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError> {
            self.inner.remove_role(member, role).await
        }

        async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
            self.inner.send_message(channel, text).await
        }
    }

    struct Fixture {
        platform: Arc<MemoryPlatform>,
        router: Arc<EventRouter>,
        guild: GuildId,
    }

    fn config() -> BotConfig {
        BotConfig {
            bias_roles: vec!["alice".to_string(), "bora".to_string()],
            join_message: Some("Welcome {user}!".to_string()),
            part_message: Some("Bye {user}.".to_string()),
            ..BotConfig::default()
        }
    }

    fn fixture(config: &BotConfig) -> Fixture {
        let platform = Arc::new(MemoryPlatform::new());
        let guild = GuildId(1000);
        platform.seed_guild(guild);
        let router = Arc::new(EventRouter::new(
            platform.clone(),
            RouterSettings::from_config(config),
        ));
        Fixture {
            platform,
            router,
            guild,
        }
    }

    fn command(member: &MemberRef, name: &str, arg: Option<&str>) -> PlatformEvent {
        PlatformEvent::Command(CommandInvocation {
            member: member.clone(),
            channel: ChannelId(5),
            name: name.to_string(),
            args: arg.map(|a| vec![a.to_string()]).unwrap_or_default(),
        })
    }

    #[test]
    fn test_connection_state_transitions() {
        let state = ConnectionState::Disconnected;
        let state = state.next(&PlatformEvent::Connecting);
        assert_eq!(state, ConnectionState::Connecting);
        let state = state.next(&PlatformEvent::Ready { guilds: vec![] });
        assert_eq!(state, ConnectionState::Ready);
        let state = state.next(&PlatformEvent::GuildRemoved(GuildId(1)));
        assert_eq!(state, ConnectionState::Ready);
        let state = state.next(&PlatformEvent::Connecting);
        assert_eq!(state, ConnectionState::Ready);
        let state = state.next(&PlatformEvent::Disconnected);
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_settings_ignore_empty_templates() {
        let config = BotConfig {
            join_message: Some(String::new()),
            part_message: Some("Bye {user}".to_string()),
            ..BotConfig::default()
        };
        let settings = RouterSettings::from_config(&config);
        assert_eq!(settings.join_message, None);
        assert_eq!(settings.part_message.as_deref(), Some("Bye {user}"));
        assert_eq!(render_template("Bye {user}, {user}", "<@3>"), "Bye <@3>, <@3>");
    }

    #[tokio::test]
    async fn test_session_end_to_end() {
        let fx = fixture(&config());
        let general = fx.platform.seed_channel(fx.guild, "general", ChannelKind::Text);

        fx.router.handle(PlatformEvent::Connecting).await;
        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild],
            })
            .await;
        assert_eq!(fx.router.connection(), ConnectionState::Ready);

        let exclusive = fx.platform.roles_named(fx.guild, "Alice");
        assert_eq!(exclusive.len(), 1);
        assert!(exclusive[0].hoist);
        let sub = fx.platform.roles_named(fx.guild, "alice");
        assert_eq!(sub.len(), 1);
        assert!(!sub[0].hoist);

        let member = fx.platform.seed_member(fx.guild, "dana");
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::MemberJoined(member.clone())))
            .await;
        assert_eq!(
            fx.platform.sent_messages(),
            vec![(general.id, format!("Welcome {}!", member.mention()))]
        );

        fx.platform.clear_calls();
        fx.router.handle(command(&member, "bias", Some("alice"))).await;
        fx.router.handle(command(&member, "bias", Some("bora"))).await;
        assert_eq!(
            fx.platform.sent_messages(),
            vec![
                (ChannelId(5), format!("{} set bias to Alice.", member.mention())),
                (
                    ChannelId(5),
                    format!("{} changed bias from alice to bora.", member.mention())
                ),
            ]
        );
        let bora = fx.platform.roles_named(fx.guild, "Bora");
        assert_eq!(fx.platform.member_roles(&member), vec![bora[0].id]);
    }

    #[tokio::test]
    async fn test_single_bias_scenario() {
        let config = BotConfig {
            bias_roles: vec!["alice".to_string()],
            ..BotConfig::default()
        };
        let fx = fixture(&config);
        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild],
            })
            .await;

        let exclusive = fx.platform.roles_named(fx.guild, "Alice");
        let sub = fx.platform.roles_named(fx.guild, "alice");
        assert_eq!((exclusive.len(), sub.len()), (1, 1));
        assert!(exclusive[0].hoist && !sub[0].hoist);

        let member = fx.platform.seed_member(fx.guild, "dana");
        let mention = member.mention();
        fx.platform.clear_calls();

        fx.router.handle(command(&member, "bias", Some("alice"))).await;
        assert_eq!(fx.platform.member_roles(&member), vec![exclusive[0].id]);
        fx.router.handle(command(&member, "sbias", Some("alice"))).await;
        assert_eq!(
            fx.platform.member_roles(&member),
            vec![exclusive[0].id, sub[0].id]
        );
        fx.router.handle(command(&member, "unbias", None)).await;
        assert_eq!(fx.platform.member_roles(&member), vec![sub[0].id]);

        let replies: Vec<String> = fx
            .platform
            .sent_messages()
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        assert_eq!(
            replies,
            vec![
                format!("{} set bias to Alice.", mention),
                format!("{} set sub-bias to Alice.", mention),
                format!("{} removed Alice bias.", mention),
            ]
        );
    }

    #[tokio::test]
    async fn test_events_before_ready_are_replayed() {
        let fx = fixture(&config());
        let general = fx.platform.seed_channel(fx.guild, "general", ChannelKind::Text);
        let member = fx.platform.seed_member(fx.guild, "eun");

        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::MemberJoined(member.clone())))
            .await;
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::MemberRemoved(member.clone())))
            .await;
        assert!(fx.platform.sent_messages().is_empty());

        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild],
            })
            .await;
        assert_eq!(
            fx.platform.sent_messages(),
            vec![
                (general.id, format!("Welcome {}!", member.mention())),
                (general.id, format!("Bye {}.", member.mention())),
            ]
        );
    }

    #[tokio::test]
    async fn test_disconnect_discards_session_state() {
        let fx = fixture(&config());
        fx.platform.seed_channel(fx.guild, "general", ChannelKind::Text);
        let member = fx.platform.seed_member(fx.guild, "dana");
        let ready = PlatformEvent::Ready {
            guilds: vec![fx.guild],
        };

        fx.router.handle(ready.clone()).await;
        let created = fx.platform.create_role_count();
        assert!(fx.router.guilds().catalog(fx.guild).is_some());

        fx.router.handle(PlatformEvent::Disconnected).await;
        let state = fx.router.guilds().get(fx.guild).unwrap();
        assert!(state.catalog().is_none());
        assert!(state.general_channel().is_none());

        fx.platform.clear_calls();
        fx.router.handle(command(&member, "bias", Some("alice"))).await;
        assert!(fx.platform.calls().is_empty());

        fx.router.handle(ready).await;
        assert!(fx.router.guilds().catalog(fx.guild).is_some());
        assert!(state.general_channel().is_some());
        assert_eq!(fx.platform.create_role_count(), 0);
        assert!(created > 0);
    }

    #[tokio::test]
    async fn test_provisioning_failure_is_isolated() {
        let fx = fixture(&config());
        let healthy = GuildId(2000);
        for name in ["Alice", "Bora"] {
            fx.platform.seed_role(healthy, name, true);
            fx.platform.seed_role(healthy, &name.to_lowercase(), false);
        }
        let general = fx.platform.seed_channel(fx.guild, "general", ChannelKind::Text);
        fx.platform.fail_on(FailPoint::CreateRole);

        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild, healthy],
            })
            .await;
        assert!(fx.router.guilds().catalog(fx.guild).is_none());
        assert!(fx.router.guilds().catalog(healthy).is_some());

        // Channels and announcements still work without a catalog.
        let member = fx.platform.seed_member(fx.guild, "dana");
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::MemberJoined(member.clone())))
            .await;
        assert_eq!(
            fx.platform.sent_messages(),
            vec![(general.id, format!("Welcome {}!", member.mention()))]
        );

        let other = fx.platform.seed_member(healthy, "eun");
        fx.router.handle(command(&other, "bias", Some("bora"))).await;
        let bora = fx.platform.roles_named(healthy, "Bora");
        assert_eq!(fx.platform.member_roles(&other), vec![bora[0].id]);
    }

    #[tokio::test]
    async fn test_channel_events_update_tracking() {
        let fx = fixture(&BotConfig::default());
        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild],
            })
            .await;
        let state = fx.router.guilds().get(fx.guild).unwrap();
        assert!(state.updates_channel().is_none());

        let updates = fx.platform.seed_channel(fx.guild, "updates", ChannelKind::Text);
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::ChannelCreated(updates.clone())))
            .await;
        assert_eq!(state.updates_channel(), Some(updates.clone()));

        let voice = fx.platform.seed_channel(fx.guild, "general", ChannelKind::Voice);
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::ChannelCreated(voice)))
            .await;
        assert!(state.general_channel().is_none());

        fx.platform.drop_channel(fx.guild, updates.id);
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::ChannelDeleted(updates)))
            .await;
        assert!(state.updates_channel().is_none());
    }

    #[tokio::test]
    async fn test_guild_lifecycle_after_ready() {
        let fx = fixture(&config());
        fx.router
            .handle(PlatformEvent::Ready { guilds: vec![] })
            .await;
        assert!(fx.router.guilds().is_empty());

        fx.router
            .handle(PlatformEvent::GuildAvailable(fx.guild))
            .await;
        assert!(fx.router.guilds().catalog(fx.guild).is_some());
        let created = fx.platform.create_role_count();

        // Already provisioned for this session.
        fx.router
            .handle(PlatformEvent::GuildAvailable(fx.guild))
            .await;
        assert_eq!(fx.platform.create_role_count(), created);
        assert_eq!(fx.platform.calls().len(), created);

        fx.router.handle(PlatformEvent::GuildRemoved(fx.guild)).await;
        assert!(fx.router.guilds().is_empty());
    }

    #[tokio::test]
    async fn test_commands_ignored_while_disconnected() {
        let fx = fixture(&config());
        let member = fx.platform.seed_member(fx.guild, "dana");
        fx.router.handle(command(&member, "unbias", None)).await;
        assert!(fx.platform.calls().is_empty());
        assert_eq!(fx.router.epoch(), 0);
    }

    #[tokio::test]
    async fn test_connecting_after_ready_keeps_session() {
        let fx = fixture(&config());
        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild],
            })
            .await;
        let epoch = fx.router.epoch();

        fx.router.handle(PlatformEvent::Connecting).await;
        assert_eq!(fx.router.connection(), ConnectionState::Ready);
        assert_eq!(fx.router.epoch(), epoch);
        assert!(fx.router.guilds().catalog(fx.guild).is_some());

        let member = fx.platform.seed_member(fx.guild, "dana");
        fx.platform.clear_calls();
        fx.router.handle(command(&member, "bias", Some("alice"))).await;
        let alice = fx.platform.roles_named(fx.guild, "Alice");
        assert_eq!(fx.platform.member_roles(&member), vec![alice[0].id]);
    }

    #[tokio::test]
    async fn test_events_for_unknown_guild_dropped_while_ready() {
        let fx = fixture(&config());
        fx.router
            .handle(PlatformEvent::Ready {
                guilds: vec![fx.guild],
            })
            .await;

        let stranger = GuildId(999);
        let channel = Channel {
            id: ChannelId(77),
            guild_id: stranger,
            name: "general".to_string(),
            kind: ChannelKind::Text,
        };
        fx.router
            .handle(PlatformEvent::Guild(GuildEvent::ChannelCreated(channel)))
            .await;
        assert!(fx.router.guilds().get(stranger).is_none());
        assert_eq!(fx.router.guilds().ids(), vec![fx.guild]);
    }

    #[tokio::test]
    async fn test_disconnect_discards_in_flight_provisioning() {
        let inner = Arc::new(MemoryPlatform::new());
        let guild = GuildId(1000);
        inner.seed_guild(guild);
        let platform = Arc::new(GatedPlatform::new(Arc::clone(&inner)));
        let router = Arc::new(EventRouter::new(
            platform.clone(),
            RouterSettings::from_config(&config()),
        ));
        let ready = PlatformEvent::Ready {
            guilds: vec![guild],
        };

        let session = tokio::spawn({
            let router = Arc::clone(&router);
            let ready = ready.clone();
            async move { router.handle(ready).await }
        });
        platform.entered.notified().await;

        router.handle(PlatformEvent::Disconnected).await;
        platform.open();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.await.unwrap();

        assert!(router.guilds().catalog(guild).is_none());
        assert_eq!(inner.create_role_count(), 0);
        assert_eq!(router.connection(), ConnectionState::Disconnected);

        router.handle(ready).await;
        assert!(router.guilds().catalog(guild).is_some());
        assert_eq!(inner.create_role_count(), 4);
    }
}
