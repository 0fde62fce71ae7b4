//! Shared registration behaviour for bots and extensions.
//!
//! A [`Registry`] stores everything a bot reacts to: commands and groups
//! keyed by trigger name, event handlers keyed by [`EventKind`], global
//! checks, scheduled tasks and bot-level error handlers. [`crate::Bot`] owns
//! one directly; [`crate::Extension`] carries a detached one that is merged
//! into the bot when loaded.
//!
//! Registration happens during startup; once the bot runs, the registry is
//! shared immutably behind an `Arc`.

use std::{collections::HashMap, future::Future, sync::Arc};

use futures::future::BoxFuture;
use log::debug;

use crate::{
    bot::BotHandle,
    command::{Check, Command, boxed_check},
    errors::{Error, ErrorKind},
    events::{Event, EventKind},
    group::Group,
    room::Room,
    scheduler::{Task, parse_cron},
};

/// Boxed event handler.
pub(crate) type EventCallback =
    Arc<dyn Fn(Room, Event) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// Boxed bot-level error handler.
pub(crate) type BotErrorCallback = Arc<dyn Fn(Error) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered trigger: either a plain command or a group.
#[derive(Clone)]
pub enum Entry {
    /// A plain command
    Command(Arc<Command>),
    /// A group with subcommands
    Group(Arc<Group>),
}

impl Entry {
    /// Returns the trigger name.
    pub fn name(&self) -> &str {
        match self {
            Entry::Command(command) => command.name(),
            Entry::Group(group) => group.name(),
        }
    }

    /// Returns the description, empty when unset.
    pub fn description_text(&self) -> &str {
        match self {
            Entry::Command(command) => command.description_text(),
            Entry::Group(group) => group.description_text(),
        }
    }

    /// Returns the usage string for the given prefix.
    pub fn usage_text(&self, prefix: &str) -> String {
        match self {
            Entry::Command(command) => command.usage_text(prefix),
            Entry::Group(group) => group.usage_text(prefix),
        }
    }

    /// Returns the group when this entry is one.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Entry::Group(group) => Some(group),
            Entry::Command(_) => None,
        }
    }

    /// Invokes the entry with the given context.
    pub(crate) async fn invoke(&self, ctx: crate::context::Context) -> Result<(), Error> {
        match self {
            Entry::Command(command) => command.invoke(ctx).await,
            Entry::Group(group) => group.invoke(ctx).await,
        }
    }

    /// Routes an invocation error through the entry's own handlers.
    pub(crate) async fn dispatch_error(
        &self,
        ctx: crate::context::Context,
        error: Error,
    ) -> Option<Error> {
        match self {
            Entry::Command(command) => command.dispatch_error(ctx, error).await,
            Entry::Group(group) => group.dispatch_error(ctx, error).await,
        }
    }
}

/// Registration store shared by [`crate::Bot`] and [`crate::Extension`].
#[derive(Default)]
pub struct Registry {
    /// Commands and groups keyed by trigger name
    commands: HashMap<String, Entry>,
    /// Event handlers keyed by kind, called in registration order
    event_handlers: HashMap<EventKind, Vec<EventCallback>>,
    /// Checks run before every command invocation
    checks: Vec<Check>,
    /// Scheduled tasks, started with the bot
    tasks: Vec<Task>,
    /// Bot-level error handlers keyed by kind
    error_handlers: HashMap<ErrorKind, BotErrorCallback>,
    /// Catch-all bot-level error handler
    fallback_error_handler: Option<BotErrorCallback>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registers a command.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] when the trigger name is taken by a
    /// command or group.
    pub fn command(&mut self, command: Command) -> Result<(), Error> {
        self.insert(Entry::Command(Arc::new(command)))
    }

    /// Registers a group.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] when the trigger name is taken by a
    /// command or group.
    pub fn group(&mut self, group: Group) -> Result<(), Error> {
        self.insert(Entry::Group(Arc::new(group)))
    }

    fn insert(&mut self, entry: Entry) -> Result<(), Error> {
        let name = entry.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(Error::AlreadyRegistered { name });
        }

        debug!("command '{}' registered", name);
        self.commands.insert(name, entry);
        Ok(())
    }

    /// Registers an event handler for `kind`.
    ///
    /// Multiple handlers per kind are supported and called in registration
    /// order. Handlers receive the room the event happened in and the event
    /// payload.
    pub fn on<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(Room, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        debug!("event handler registered for {:?}", kind);
        self.event_handlers
            .entry(kind)
            .or_default()
            .push(Arc::new(move |room, event| Box::pin(handler(room, event))));
    }

    /// Registers a check run before every command invocation.
    ///
    /// The check receives the invocation [`crate::Context`] and must return
    /// `true` for the command to run; a `false` aborts with
    /// [`Error::CheckFailed`].
    pub fn check<F, Fut>(&mut self, check: F)
    where
        F: Fn(crate::context::Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Error>> + Send + 'static,
    {
        debug!("global check registered");
        self.checks.push(boxed_check(check));
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
        let schedule = parse_cron(expr)?;
        debug!("task scheduled for '{}'", expr);
        self.tasks.push(Task {
            expr: expr.to_string(),
            schedule,
            callback: Arc::new(move |bot| Box::pin(task(bot))),
        });
        Ok(())
    }

    /// Registers a bot-level error handler for a specific [`ErrorKind`].
    pub fn on_error<F, Fut>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!("error handler registered for {:?}", kind);
        self.error_handlers
            .insert(kind, Arc::new(move |error| Box::pin(handler(error))));
    }

    /// Registers a catch-all bot-level error handler.
    pub fn on_any_error<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.fallback_error_handler = Some(Arc::new(move |error| Box::pin(handler(error))));
    }

    /// Looks up a command or group by trigger name.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.commands.get(name)
    }

    /// Returns all registered entries, keyed by trigger name.
    pub fn commands(&self) -> &HashMap<String, Entry> {
        &self.commands
    }

    /// Returns the handlers registered for `kind`.
    pub(crate) fn event_handlers(&self, kind: EventKind) -> &[EventCallback] {
        self.event_handlers
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the global checks.
    pub(crate) fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Moves the scheduled tasks out, leaving the registry without any.
    pub(crate) fn take_tasks(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }

    /// Routes an error through the bot-level handlers.
    ///
    /// Returns `None` when a handler consumed the error.
    pub(crate) async fn dispatch_error(&self, error: Error) -> Option<Error> {
        if let Some(handler) = self.error_handlers.get(&error.kind()) {
            handler(error).await;
            return None;
        }
        if let Some(handler) = &self.fallback_error_handler {
            handler(error).await;
            return None;
        }
        Some(error)
    }

    /// Merges another registry into this one.
    ///
    /// Used by [`crate::Bot::load_extension`]. Command triggers must stay
    /// unique; event handlers, checks, tasks and error handlers append.
    /// Kind-specific error handlers from `other` win over existing ones,
    /// matching the latest-registration semantics of [`Registry::on_error`].
    pub(crate) fn merge(&mut self, other: Registry) -> Result<(), Error> {
        for name in other.commands.keys() {
            if self.commands.contains_key(name) {
                return Err(Error::AlreadyRegistered { name: name.clone() });
            }
        }

        self.commands.extend(other.commands);
        for (kind, handlers) in other.event_handlers {
            self.event_handlers.entry(kind).or_default().extend(handlers);
        }
        self.checks.extend(other.checks);
        self.tasks.extend(other.tasks);
        self.error_handlers.extend(other.error_handlers);
        if other.fallback_error_handler.is_some() {
            self.fallback_error_handler = other.fallback_error_handler;
        }

        Ok(())
    }
}
