//! Command groups with named subcommands.

use std::{collections::HashMap, future::Future, sync::Arc};

use crate::{command::Command, context::Context, errors::Error};

/// A parent command holding named subcommands.
///
/// On invocation the first argument selects the subcommand and the remaining
/// arguments shift left; without arguments the group's own handler runs. An
/// unknown subcommand name raises [`Error::CommandNotFound`].
///
/// # Examples
///
/// ```no_run
/// use trellis::{Command, Group};
///
/// let math = Group::new("math", |ctx| async move { ctx.reply("You called !math").await })
///     .description("Group of mathematical commands")
///     .subcommand(Command::new("add", |ctx| async move {
///         let a: i64 = ctx.arg(0)?;
///         let b: i64 = ctx.arg(1)?;
///         ctx.reply(&format!("{a} + {b} = {}", a + b)).await
///     }))
///     .unwrap();
/// ```
pub struct Group {
    /// The group's own command, run when no subcommand is named
    command: Command,
    /// Subcommands keyed by name
    subcommands: HashMap<String, Arc<Command>>,
}

impl Group {
    /// Creates a group with a trigger name and a handler for bare
    /// invocations.
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Group {
            command: Command::new(name, handler),
            subcommands: HashMap::new(),
        }
    }

    /// Sets the description shown by the help command.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.command = self.command.description(description);
        self
    }

    /// Overrides the usage string shown by the help command.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.command = self.command.usage(usage);
        self
    }

    /// Adds a check predicate gating the group and all its subcommands.
    pub fn check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Error>> + Send + 'static,
    {
        self.command = self.command.check(check);
        self
    }

    /// Attaches a subcommand.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] when a subcommand with the same name
    /// exists.
    pub fn subcommand(mut self, command: Command) -> Result<Self, Error> {
        let name = command.name().to_string();
        if self.subcommands.contains_key(&name) {
            return Err(Error::AlreadyRegistered { name });
        }

        log::debug!("subcommand '{}' registered on group '{}'", name, self.name());
        self.subcommands.insert(name, Arc::new(command));
        Ok(self)
    }

    /// Returns the trigger name.
    pub fn name(&self) -> &str {
        self.command.name()
    }

    /// Returns the description, empty when unset.
    pub fn description_text(&self) -> &str {
        self.command.description_text()
    }

    /// Returns the usage string, `"{prefix}{name} [subcommand]"` when unset.
    pub fn usage_text(&self, prefix: &str) -> String {
        match self.command.usage_text(prefix) {
            usage if usage == format!("{prefix}{}", self.name()) => {
                format!("{usage} [subcommand]")
            }
            usage => usage,
        }
    }

    /// Looks up a subcommand by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Command>> {
        self.subcommands.get(name)
    }

    /// Returns all subcommands, keyed by name.
    pub fn subcommands(&self) -> &HashMap<String, Arc<Command>> {
        &self.subcommands
    }

    /// Dispatches the invocation to a subcommand or the group handler.
    pub(crate) async fn invoke(&self, mut ctx: Context) -> Result<(), Error> {
        let Some(first) = ctx.args.first().cloned() else {
            return self.command.invoke(ctx).await;
        };

        match self.subcommands.get(&first) {
            Some(subcommand) => {
                // Group-level checks and cooldown gate subcommands too.
                self.command.run_checks(&ctx).await?;

                ctx.args.remove(0);
                ctx.command = Some(first);
                subcommand.invoke(ctx).await
            }
            None => Err(Error::CommandNotFound {
                name: format!("{} {first}", self.name()),
            }),
        }
    }

    /// Routes an invocation error through the group's error handlers.
    pub(crate) async fn dispatch_error(&self, ctx: Context, error: Error) -> Option<Error> {
        self.command.dispatch_error(ctx, error).await
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name())
            .field("subcommands", &self.subcommands.keys())
            .finish()
    }
}
