//! Discord adapter built on serenity.
//!
//! [`DiscordPlatform`] implements [`ChatPlatform`] over the REST client and
//! [`Handler`] translates gateway callbacks into [`PlatformEvent`]s for the
//! router.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serenity::builder::{EditMember, EditRole};
use serenity::client::{Client, Context, EventHandler};
use serenity::gateway::{ConnectionStage, ShardStageUpdateEvent};
use serenity::http::Http;
use serenity::model::channel::{ChannelType, GuildChannel, Message};
use serenity::model::event::ResumedEvent;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::guild::{Guild, Member, UnavailableGuild};
use serenity::model::id as sid;
use serenity::model::user::User;
use tracing::{debug, info};

use super::{
    Channel, ChannelId, ChannelKind, ChatPlatform, CommandInvocation, GuildEvent, GuildId,
    MemberRef, PlatformError, PlatformEvent, Role, RoleId,
};
use crate::commands::parse_message;
use crate::config::BotConfig;
use crate::router::{EventRouter, RouterSettings};

fn map_error(err: serenity::Error) -> PlatformError {
    match &err {
        serenity::Error::Http(http) => match http.status_code().map(|s| s.as_u16()) {
            Some(403) => PlatformError::PermissionDenied(err.to_string()),
            Some(404) => PlatformError::NotFound(err.to_string()),
            _ => PlatformError::RequestFailed(err.to_string()),
        },
        serenity::Error::Gateway(_) => PlatformError::ConnectionFailed(err.to_string()),
        _ => PlatformError::RequestFailed(err.to_string()),
    }
}

fn guild_id(id: GuildId) -> sid::GuildId {
    sid::GuildId::new(id.get())
}

fn user_id(member: &MemberRef) -> sid::UserId {
    sid::UserId::new(member.user_id.get())
}

fn role(role: serenity::model::guild::Role) -> Role {
    Role {
        id: RoleId(role.id.get()),
        name: role.name,
        hoist: role.hoist,
    }
}

fn channel(channel: &GuildChannel) -> Channel {
    let kind = match channel.kind {
        ChannelType::Text | ChannelType::News => ChannelKind::Text,
        ChannelType::Voice | ChannelType::Stage => ChannelKind::Voice,
        ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    };
    Channel {
        id: ChannelId(channel.id.get()),
        guild_id: GuildId(channel.guild_id.get()),
        name: channel.name.clone(),
        kind,
    }
}

fn member_ref(guild: sid::GuildId, user: &User) -> MemberRef {
    MemberRef::new(GuildId(guild.get()), user.id.get().into(), user.name.clone())
}

/// [`ChatPlatform`] over Discord's REST API.
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    fn name(&self) -> &str {
        "discord"
    }

    async fn list_roles(&self, guild: GuildId) -> Result<Vec<Role>, PlatformError> {
        let roles = guild_id(guild).roles(&self.http).await.map_err(map_error)?;
        let mut roles: Vec<Role> = roles.into_values().map(role).collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<Channel>, PlatformError> {
        let channels = guild_id(guild)
            .channels(&self.http)
            .await
            .map_err(map_error)?;
        let mut channels: Vec<Channel> = channels.values().map(channel).collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn current_roles(&self, member: &MemberRef) -> Result<Vec<RoleId>, PlatformError> {
        let fetched = self
            .http
            .get_member(guild_id(member.guild_id), user_id(member))
            .await
            .map_err(map_error)?;
        Ok(fetched.roles.iter().map(|r| RoleId(r.get())).collect())
    }

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        hoist: bool,
    ) -> Result<Role, PlatformError> {
        let builder = EditRole::new().name(name).hoist(hoist);
        let created = guild_id(guild)
            .create_role(&self.http, builder)
            .await
            .map_err(map_error)?;
        Ok(role(created))
    }

    async fn replace_roles(
        &self,
        member: &MemberRef,
        roles: &[RoleId],
    ) -> Result<(), PlatformError> {
        let edit = EditMember::new().roles(roles.iter().map(|r| sid::RoleId::new(r.get())));
        guild_id(member.guild_id)
            .edit_member(&self.http, user_id(member), edit)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn add_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError> {
        self.http
            .add_member_role(
                guild_id(member.guild_id),
                user_id(member),
                sid::RoleId::new(role.get()),
                None,
            )
            .await
            .map_err(map_error)
    }

    async fn remove_role(&self, member: &MemberRef, role: RoleId) -> Result<(), PlatformError> {
        self.http
            .remove_member_role(
                guild_id(member.guild_id),
                user_id(member),
                sid::RoleId::new(role.get()),
                None,
            )
            .await
            .map_err(map_error)
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), PlatformError> {
        sid::ChannelId::new(channel.get())
            .say(&self.http, text)
            .await
            .map_err(map_error)?;
        Ok(())
    }
}

/// Gateway callbacks forwarded to the router.
pub struct Handler {
    router: Arc<EventRouter>,
    prefix: String,
}

impl Handler {
    pub fn new(router: Arc<EventRouter>, prefix: impl Into<String>) -> Self {
        Self {
            router,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Connected to Discord");
        let guilds = ready.guilds.iter().map(|g| GuildId(g.id.get())).collect();
        self.router.handle(PlatformEvent::Ready { guilds }).await;
    }

    async fn resume(&self, _ctx: Context, _: ResumedEvent) {
        // A resumed session skips READY; rebuild the guilds known so far.
        let guilds = self.router.guilds().ids();
        info!(guilds = guilds.len(), "Session resumed");
        self.router.handle(PlatformEvent::Ready { guilds }).await;
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        debug!(from = ?event.old, to = ?event.new, "Shard stage changed");
        let mapped = match event.new {
            ConnectionStage::Disconnected => PlatformEvent::Disconnected,
            ConnectionStage::Connected => return,
            _ => PlatformEvent::Connecting,
        };
        self.router.handle(mapped).await;
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.router
            .handle(PlatformEvent::GuildAvailable(GuildId(guild.id.get())))
            .await;
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // Outages also arrive as deletes, flagged unavailable.
        if incomplete.unavailable {
            debug!(guild = %incomplete.id, "Guild unavailable");
            return;
        }
        self.router
            .handle(PlatformEvent::GuildRemoved(GuildId(incomplete.id.get())))
            .await;
    }

    async fn channel_create(&self, _ctx: Context, created: GuildChannel) {
        let event = GuildEvent::ChannelCreated(channel(&created));
        self.router.handle(PlatformEvent::Guild(event)).await;
    }

    async fn channel_delete(
        &self,
        _ctx: Context,
        deleted: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        let event = GuildEvent::ChannelDeleted(channel(&deleted));
        self.router.handle(PlatformEvent::Guild(event)).await;
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        let member = member_ref(new_member.guild_id, &new_member.user);
        self.router
            .handle(PlatformEvent::Guild(GuildEvent::MemberJoined(member)))
            .await;
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild: sid::GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        let member = member_ref(guild, &user);
        self.router
            .handle(PlatformEvent::Guild(GuildEvent::MemberRemoved(member)))
            .await;
    }

    async fn message(&self, _ctx: Context, message: Message) {
        if message.author.bot {
            return;
        }
        let Some(guild) = message.guild_id else {
            return;
        };
        let Some((name, args)) = parse_message(&message.content, &self.prefix) else {
            return;
        };
        debug!(guild = %guild, user = %message.author.name, command = %name, "Command received");
        let invocation = CommandInvocation {
            member: member_ref(guild, &message.author),
            channel: ChannelId(message.channel_id.get()),
            name,
            args,
        };
        self.router.handle(PlatformEvent::Command(invocation)).await;
    }
}

/// Connect with `config` and process gateway events until the client stops.
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let http = Arc::new(Http::new(&config.token));
    let platform = Arc::new(DiscordPlatform::new(Arc::clone(&http)));
    let router = Arc::new(EventRouter::new(
        platform,
        RouterSettings::from_config(&config),
    ));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&config.token, intents)
        .event_handler(Handler::new(router, config.command_prefix.clone()))
        .await
        .context("failed to build Discord client")?;

    info!("Starting Discord client");
    client.start().await.context("Discord client stopped")?;
    Ok(())
}
