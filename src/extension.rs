//! Extensions: reusable bundles of commands, events and schedules.
//!
//! An extension carries its own [`Registry`] and is merged into a bot with
//! [`crate::Bot::load_extension`]. This lets a crate or module ship a set of
//! related commands as one unit:
//!
//! ```no_run
//! use trellis::{Command, Extension};
//!
//! fn greeter() -> Extension {
//!     let mut extension = Extension::new("greeter");
//!     extension
//!         .command(Command::new("greet", |ctx| async move { ctx.reply("Hello!").await }))
//!         .unwrap();
//!     extension.on_load(|_bot| async move {
//!         log::info!("greeter loaded");
//!         Ok(())
//!     });
//!     extension
//! }
//! ```

use std::{future::Future, sync::Arc};

use futures::future::BoxFuture;

use crate::{
    bot::BotHandle,
    command::Command,
    errors::{Error, ErrorKind},
    events::{Event, EventKind},
    group::Group,
    registry::Registry,
    room::Room,
};

/// Boxed on-load hook.
pub(crate) type LoadCallback =
    Arc<dyn Fn(BotHandle) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// A named bundle of registrations that can be loaded into a bot.
pub struct Extension {
    /// Extension name, used in logs
    name: String,
    /// The detached registry merged into the bot on load
    registry: Registry,
    /// Hook fired once the bot is up
    on_load: Option<LoadCallback>,
}

impl Extension {
    /// Creates an empty extension.
    pub fn new(name: impl Into<String>) -> Self {
        Extension {
            name: name.into(),
            registry: Registry::new(),
            on_load: None,
        }
    }

    /// Returns the extension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a command on the extension.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] on a duplicate trigger within the
    /// extension. Clashes with the bot surface at load time.
    pub fn command(&mut self, command: Command) -> Result<(), Error> {
        self.registry.command(command)
    }

    /// Registers a group on the extension.
    pub fn group(&mut self, group: Group) -> Result<(), Error> {
        self.registry.group(group)
    }

    /// Registers an event handler on the extension.
    pub fn on<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(Room, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.registry.on(kind, handler);
    }

    /// Registers a global check on the extension.
    pub fn check<F, Fut>(&mut self, check: F)
    where
        F: Fn(crate::context::Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Error>> + Send + 'static,
    {
        self.registry.check(check);
    }

    /// Registers a scheduled task on the extension.
    pub fn schedule<F, Fut>(&mut self, expr: &str, task: F) -> Result<(), Error>
    where
        F: Fn(BotHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.registry.schedule(expr, task)
    }

    /// Registers a bot-level error handler on the extension.
    pub fn on_error<F, Fut>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registry.on_error(kind, handler);
    }

    /// Registers a hook fired after the extension is loaded and the bot is
    /// logged in.
    pub fn on_load<F, Fut>(&mut self, hook: F)
    where
        F: Fn(BotHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.on_load = Some(Arc::new(move |bot| Box::pin(hook(bot))));
    }

    /// Splits the extension into its parts for loading.
    pub(crate) fn into_parts(self) -> (String, Registry, Option<LoadCallback>) {
        (self.name, self.registry, self.on_load)
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("commands", &self.registry.commands().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_collects_registrations() {
        let mut extension = Extension::new("games");
        extension
            .command(Command::new("roll", |_ctx| async move { Ok(()) }))
            .unwrap();
        extension.on(EventKind::Message, |_room, _event| async move { Ok(()) });
        extension
            .schedule("* * * * *", |_bot| async move { Ok(()) })
            .unwrap();

        let (name, registry, on_load) = extension.into_parts();
        assert_eq!(name, "games");
        assert!(registry.get("roll").is_some());
        assert!(on_load.is_none());
    }

    #[test]
    fn test_extension_duplicate_command() {
        let mut extension = Extension::new("games");
        extension
            .command(Command::new("roll", |_ctx| async move { Ok(()) }))
            .unwrap();

        let result = extension.command(Command::new("roll", |_ctx| async move { Ok(()) }));
        assert!(matches!(result, Err(Error::AlreadyRegistered { .. })));
    }

    #[test]
    fn test_on_load_is_kept() {
        let mut extension = Extension::new("games");
        extension.on_load(|_bot| async move { Ok(()) });

        let (_, _, on_load) = extension.into_parts();
        assert!(on_load.is_some());
    }
}
