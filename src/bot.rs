//! The bot: registration surface, login and the event dispatch loop.
//!
//! # Overview
//!
//! A [`Bot`] is built from a [`Config`], populated with commands, groups,
//! event handlers, checks and scheduled tasks, and then started with
//! [`Bot::run`], which logs in and drives the SDK sync loop until the
//! process terminates.
//!
//! ```no_run
//! use trellis::{Bot, Command, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trellis::Error> {
//!     let mut bot = Bot::new(Config::load("config.yaml")?);
//!
//!     bot.command(Command::new("ping", |ctx| async move { ctx.reply("Pong!").await }))?;
//!
//!     bot.run().await
//! }
//! ```
//!
//! # Dispatch
//!
//! For every incoming room message the bot:
//!
//! 1. Drops events sent by its own account and events older than the start
//!    timestamp.
//! 2. Fans the event out to the registered [`EventKind::Message`] handlers.
//! 3. When the body starts with the command prefix, resolves the command,
//!    builds a [`Context`], runs the global checks and invokes the handler.
//!
//! Errors never stop the sync loop: they flow through the command's error
//! handlers, then the bot-level handlers, and finally a default that
//! replies with the usage line for argument errors and logs everything
//! else. Reaction, membership and typing events follow steps 1 and 2 with
//! their own kinds, and invitations are auto-joined with retry.

use std::{collections::HashMap, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use matrix_sdk::{
    Client, Room as SdkRoom, RoomState, SessionMeta, SessionTokens,
    authentication::matrix::MatrixSession,
    config::SyncSettings,
    ruma::{
        MilliSecondsSinceUnixEpoch, UserId,
        api::client::filter::FilterDefinition,
        events::{
            reaction::OriginalSyncReactionEvent,
            room::{
                member::{OriginalSyncRoomMemberEvent, StrippedRoomMemberEvent},
                message::{MessageType, OriginalSyncRoomMessageEvent},
            },
            typing::SyncTypingEvent,
        },
    },
};
use tokio::time::{Duration, sleep};

use crate::{
    command::Command,
    config::Config,
    context::Context,
    errors::{Error, ErrorKind},
    events::{
        Event, EventKind, MemberEvent, MessageEvent, ReactionEvent, TypingEvent,
        classify_membership,
    },
    extension::{Extension, LoadCallback},
    group::Group,
    help::{DefaultHelp, HelpFormatter, help_command},
    messenger::{MatrixMessenger, Messenger},
    registry::{Entry, Registry},
    room::Room,
    scheduler,
};

/// Device display name announced on password login.
const DEVICE_NAME: &str = "trellis bot";

/// Device id used when restoring a session from an access token.
const DEVICE_ID: &str = "TRELLIS";

/// A Matrix bot.
///
/// Holds the configuration and the registration surface. All registration
/// happens before [`Bot::run`]; afterwards the registry is shared immutably
/// with the dispatch loop.
pub struct Bot {
    /// Connection settings and credentials
    config: Config,
    /// Commands, events, checks, schedules and error handlers
    registry: Registry,
    /// Formatter used by the built-in help command
    help: Arc<dyn HelpFormatter>,
    /// Extension on-load hooks, fired once logged in
    on_load_hooks: Vec<(String, LoadCallback)>,
}

impl Bot {
    /// Creates a bot from a loaded configuration.
    ///
    /// The built-in `help` command is registered here; override its output
    /// with [`Bot::set_help`].
    pub fn new(config: Config) -> Self {
        let mut registry = Registry::new();
        registry
            .command(help_command())
            .expect("fresh registry cannot contain 'help'");

        Bot {
            config,
            registry,
            help: Arc::new(DefaultHelp::default()),
            on_load_hooks: Vec::new(),
        }
    }

    /// Convenience constructor loading the configuration from a YAML file.
    pub fn from_config_file(path: &str) -> Result<Self, Error> {
        Ok(Bot::new(Config::load(path)?))
    }

    /// Registers a command.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] when the trigger name is taken.
    pub fn command(&mut self, command: Command) -> Result<(), Error> {
        self.registry.command(command)
    }

    /// Registers a group.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] when the trigger name is taken.
    pub fn group(&mut self, group: Group) -> Result<(), Error> {
        self.registry.group(group)
    }

    /// Registers an event handler for `kind`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use trellis::{Bot, EventKind};
    /// # fn example(bot: &mut Bot) {
    /// bot.on(EventKind::Message, |room, event| async move {
    ///     if let Some(message) = event.as_message()
    ///         && message.body.to_lowercase().starts_with("thanks")
    ///     {
    ///         room.react(&message.event_id, "🙏").await?;
    ///     }
    ///     Ok(())
    /// });
    /// # }
    /// ```
    pub fn on<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(Room, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.registry.on(kind, handler);
    }

    /// Registers a check run before every command invocation.
    pub fn check<F, Fut>(&mut self, check: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Error>> + Send + 'static,
    {
        self.registry.check(check);
    }

    /// Registers a scheduled task for a 5-field cron expression.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCron`] when the expression is malformed.
    pub fn schedule<F, Fut>(&mut self, expr: &str, task: F) -> Result<(), Error>
    where
        F: Fn(BotHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.registry.schedule(expr, task)
    }

    /// Registers a bot-level error handler for a specific [`ErrorKind`].
    pub fn on_error<F, Fut>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registry.on_error(kind, handler);
    }

    /// Registers a catch-all bot-level error handler.
    pub fn on_any_error<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registry.on_any_error(handler);
    }

    /// Replaces the formatter used by the built-in help command.
    pub fn set_help(&mut self, help: impl HelpFormatter + 'static) {
        self.help = Arc::new(help);
    }

    /// Loads an extension, merging its registrations into the bot.
    ///
    /// The extension's on-load hook fires once the bot is logged in.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] when a trigger clashes with an existing
    /// command or group.
    pub fn load_extension(&mut self, extension: Extension) -> Result<(), Error> {
        let (name, registry, on_load) = extension.into_parts();
        debug!("loading extension '{}'", name);

        self.registry.merge(registry)?;
        if let Some(hook) = on_load {
            self.on_load_hooks.push((name, hook));
        }
        Ok(())
    }

    /// Logs in and runs the sync loop until the process terminates.
    ///
    /// The steps are:
    ///
    /// 1. Log in with the configured password, or restore the session from
    ///    the configured access token.
    /// 2. Fire extension on-load hooks and start the scheduler.
    /// 3. Perform one catch-up sync so the command handlers only see new
    ///    messages, then register the event handlers and sync forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are unusable, login fails or the
    /// sync loop aborts. Handler errors are routed through the error
    /// handlers and never end the loop.
    pub async fn run(self) -> Result<(), Error> {
        self.config.validate()?;

        let user_id = UserId::parse(&self.config.user_id)?;
        let client = Client::builder()
            .homeserver_url(&self.config.homeserver)
            .build()
            .await?;

        match (&self.config.token, &self.config.password) {
            (Some(token), _) => {
                debug!("restoring session from access token");
                let session = MatrixSession {
                    meta: SessionMeta {
                        user_id: user_id.clone(),
                        device_id: DEVICE_ID.into(),
                    },
                    tokens: SessionTokens {
                        access_token: token.clone(),
                        refresh_token: None,
                    },
                };
                client.restore_session(session).await?;
            }
            (None, Some(password)) => {
                debug!("logging in with password");
                client
                    .matrix_auth()
                    .login_username(user_id.clone(), password)
                    .initial_device_display_name(DEVICE_NAME)
                    .send()
                    .await?;
            }
            (None, None) => return Err(Error::MissingCredentials),
        }

        let mut registry = self.registry;
        let tasks = registry.take_tasks();

        let handle = BotHandle {
            inner: Arc::new(BotShared {
                prefix: self.config.prefix.clone(),
                user_id: user_id.to_string(),
                messenger: Arc::new(MatrixMessenger::new(client.clone())),
                registry: Arc::new(registry),
                help: self.help,
                started_at: Utc::now(),
            }),
        };

        info!("starting bot as {}", user_id);

        for (name, hook) in &self.on_load_hooks {
            debug!("running on_load hook of extension '{}'", name);
            hook(handle.clone()).await?;
        }

        scheduler::start(tasks, handle.clone());

        // Auto join rooms when invited
        client.add_event_handler(auto_join);

        // Enable room members lazy-loading
        // See <https://spec.matrix.org/v1.6/client-server-api/#lazy-loading-room-members>.
        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());

        // First sync to catch up without dispatching the backlog; handlers
        // attached afterwards only see new events.
        let response = client.sync_once(sync_settings.clone()).await?;
        sync_settings = sync_settings.token(response.next_batch);

        let message_handle = handle.clone();
        client.add_event_handler(
            move |event: OriginalSyncRoomMessageEvent, room: SdkRoom| {
                let handle = message_handle.clone();
                async move { handle.on_sdk_message(event, room).await }
            },
        );

        let reaction_handle = handle.clone();
        client.add_event_handler(move |event: OriginalSyncReactionEvent, room: SdkRoom| {
            let handle = reaction_handle.clone();
            async move { handle.on_sdk_reaction(event, room).await }
        });

        let member_handle = handle.clone();
        client.add_event_handler(move |event: OriginalSyncRoomMemberEvent, room: SdkRoom| {
            let handle = member_handle.clone();
            async move { handle.on_sdk_member(event, room).await }
        });

        let typing_handle = handle.clone();
        client.add_event_handler(move |event: SyncTypingEvent, room: SdkRoom| {
            let handle = typing_handle.clone();
            async move { handle.on_sdk_typing(event, room).await }
        });

        client.sync(sync_settings).await?;

        info!("sync loop ended");
        Ok(())
    }
}

/// Shared state behind a [`BotHandle`].
struct BotShared {
    /// Command prefix
    prefix: String,
    /// The bot's own user id, used to skip its own events
    user_id: String,
    /// Outbound transport
    messenger: Arc<dyn Messenger>,
    /// The immutable registration store
    registry: Arc<Registry>,
    /// Help formatter
    help: Arc<dyn HelpFormatter>,
    /// Start timestamp; older events are dropped
    started_at: DateTime<Utc>,
}

/// Cheap handle on a running bot.
///
/// Handed to scheduled tasks and available from every [`Context`] via
/// [`Context::bot`]. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct BotHandle {
    inner: Arc<BotShared>,
}

impl BotHandle {
    /// Returns the command prefix.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Returns the bot's own user id.
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Returns a handle on a room by id.
    pub fn room(&self, room_id: &str) -> Room {
        Room::new(room_id, Arc::clone(&self.inner.messenger))
    }

    /// Returns all registered commands and groups, keyed by trigger name.
    pub fn commands(&self) -> &HashMap<String, Entry> {
        self.inner.registry.commands()
    }

    /// Returns the registration store.
    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Returns the help formatter.
    pub(crate) fn help(&self) -> Arc<dyn HelpFormatter> {
        Arc::clone(&self.inner.help)
    }

    /// True for events that happened before the bot started.
    fn is_stale(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp < self.inner.started_at
    }

    /// True for events sent by the bot's own account.
    fn is_own(&self, sender: &str) -> bool {
        sender == self.inner.user_id
    }

    /// SDK glue for room messages: filter, then dispatch.
    async fn on_sdk_message(&self, event: OriginalSyncRoomMessageEvent, room: SdkRoom) {
        if room.state() != RoomState::Joined {
            return;
        }

        // Only handle text messages
        let MessageType::Text(text_content) = event.content.msgtype else {
            return;
        };

        let message = MessageEvent {
            sender: event.sender.to_string(),
            body: text_content.body,
            event_id: event.event_id.to_string(),
            timestamp: timestamp_of(event.origin_server_ts),
        };

        self.handle_message(room.room_id().as_str(), room.name(), message)
            .await;
    }

    /// Dispatches a message: event handlers first, then command processing.
    pub(crate) async fn handle_message(
        &self,
        room_id: &str,
        room_name: Option<String>,
        message: MessageEvent,
    ) {
        if self.is_own(&message.sender) || self.is_stale(message.timestamp) {
            return;
        }

        self.dispatch_event(EventKind::Message, room_id, &Event::Message(message.clone()))
            .await;
        self.process_command(room_id, room_name, &message).await;
    }

    /// SDK glue for reactions.
    async fn on_sdk_reaction(&self, event: OriginalSyncReactionEvent, room: SdkRoom) {
        if room.state() != RoomState::Joined {
            return;
        }

        let reaction = ReactionEvent {
            sender: event.sender.to_string(),
            key: event.content.relates_to.key,
            relates_to: event.content.relates_to.event_id.to_string(),
            event_id: event.event_id.to_string(),
            timestamp: timestamp_of(event.origin_server_ts),
        };

        self.handle_reaction(room.room_id().as_str(), reaction).await;
    }

    /// Dispatches a reaction to the registered handlers.
    pub(crate) async fn handle_reaction(&self, room_id: &str, reaction: ReactionEvent) {
        if self.is_own(&reaction.sender) || self.is_stale(reaction.timestamp) {
            return;
        }

        self.dispatch_event(EventKind::Reaction, room_id, &Event::Reaction(reaction))
            .await;
    }

    /// SDK glue for membership updates.
    async fn on_sdk_member(&self, event: OriginalSyncRoomMemberEvent, room: SdkRoom) {
        let prev_membership = event.unsigned.prev_content.as_ref().map(|c| &c.membership);
        let Some(kind) = classify_membership(
            prev_membership,
            &event.content.membership,
            event.sender.as_str(),
            event.state_key.as_str(),
        ) else {
            return;
        };

        let member = MemberEvent {
            sender: event.sender.to_string(),
            user_id: event.state_key.to_string(),
            kind,
            event_id: event.event_id.to_string(),
            timestamp: timestamp_of(event.origin_server_ts),
        };

        self.handle_member(room.room_id().as_str(), member).await;
    }

    /// Dispatches a membership update: the specific kind, then
    /// [`EventKind::MemberChange`].
    pub(crate) async fn handle_member(&self, room_id: &str, member: MemberEvent) {
        if self.is_own(&member.sender) || self.is_stale(member.timestamp) {
            return;
        }

        let kind = member.kind;
        let event = Event::Member(member);
        self.dispatch_event(kind, room_id, &event).await;
        self.dispatch_event(EventKind::MemberChange, room_id, &event)
            .await;
    }

    /// SDK glue for typing notifications.
    async fn on_sdk_typing(&self, event: SyncTypingEvent, room: SdkRoom) {
        let typing = TypingEvent {
            user_ids: event
                .content
                .user_ids
                .iter()
                .map(|user_id| user_id.to_string())
                .collect(),
        };

        self.dispatch_event(EventKind::Typing, room.room_id().as_str(), &Event::Typing(typing))
            .await;
    }

    /// Fans an event out to the handlers registered for `kind`.
    pub(crate) async fn dispatch_event(&self, kind: EventKind, room_id: &str, event: &Event) {
        let room = self.room(room_id);
        for handler in self.registry().event_handlers(kind) {
            if let Err(e) = handler(room.clone(), event.clone()).await
                && let Some(e) = self.registry().dispatch_error(e).await
            {
                error!("event handler for {:?} failed: {}", kind, e);
            }
        }
    }

    /// Resolves and invokes a command from a message, routing every failure
    /// through the error-handler chain.
    pub(crate) async fn process_command(
        &self,
        room_id: &str,
        room_name: Option<String>,
        message: &MessageEvent,
    ) {
        let ctx = Context::from_message(self.clone(), room_id, room_name, message);
        let Some(name) = ctx.command.clone() else {
            return;
        };

        let Some(entry) = self.registry().get(&name) else {
            if let Some(error) = self
                .registry()
                .dispatch_error(Error::CommandNotFound { name })
                .await
            {
                debug!("{}", error);
            }
            return;
        };
        let entry = entry.clone();

        for check in self.registry().checks() {
            let passed = match check(ctx.clone()).await {
                Ok(passed) => passed,
                Err(error) => {
                    self.route_command_error(&entry, ctx.clone(), error).await;
                    return;
                }
            };
            if !passed {
                let error = Error::CheckFailed {
                    command: entry.name().to_string(),
                };
                self.route_command_error(&entry, ctx.clone(), error).await;
                return;
            }
        }

        if let Err(error) = entry.invoke(ctx.clone()).await {
            self.route_command_error(&entry, ctx, error).await;
        }
    }

    /// Routes an invocation error: command handlers, bot handlers, default.
    async fn route_command_error(&self, entry: &Entry, ctx: Context, error: Error) {
        let Some(error) = entry.dispatch_error(ctx.clone(), error).await else {
            return;
        };
        let Some(error) = self.registry().dispatch_error(error).await else {
            return;
        };

        if error.is_argument_error() {
            let usage = entry.usage_text(self.prefix());
            if let Err(e) = ctx.reply(&format!("{error}\nUsage: `{usage}`")).await {
                error!("failed to send usage reply: {}", e);
            }
            return;
        }

        error!("unhandled error in command '{}': {}", entry.name(), error);
    }
}

/// Converts a server timestamp into a [`DateTime<Utc>`].
fn timestamp_of(timestamp: MilliSecondsSinceUnixEpoch) -> DateTime<Utc> {
    let millis = i64::try_from(u64::from(timestamp.get())).unwrap_or_default();
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Automatically joins rooms when the bot receives an invitation.
///
/// # References
///
/// See <https://github.com/matrix-org/synapse/issues/4345> for the Synapse
/// issue that necessitates the retry logic.
async fn auto_join(room_member: StrippedRoomMemberEvent, client: Client, room: SdkRoom) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    // Ignore if the invite is not for us
    if room_member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(err) = room.join().await {
            // retry autojoin due to synapse sending invites, before the
            // invited user can join for more information see
            // https://github.com/matrix-org/synapse/issues/4345
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > 3600 {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }
        info!("successfully joined room {}", room.room_id());
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Builds a handle over an empty registry for context/command tests.
    pub(crate) fn handle(messenger: Arc<dyn Messenger>) -> BotHandle {
        handle_with_registry(messenger, Registry::new())
    }

    /// Builds a handle over a prepared registry.
    pub(crate) fn handle_with_registry(
        messenger: Arc<dyn Messenger>,
        registry: Registry,
    ) -> BotHandle {
        BotHandle {
            inner: Arc::new(BotShared {
                prefix: "!".to_string(),
                user_id: "@bot:example.org".to_string(),
                messenger,
                registry: Arc::new(registry),
                help: Arc::new(DefaultHelp::default()),
                started_at: Utc::now() - chrono::Duration::seconds(1),
            }),
        }
    }
}
