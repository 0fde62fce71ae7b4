//! Command registration entries and the invocation pipeline.
//!
//! A [`Command`] couples a trigger name with an async handler plus optional
//! middleware: check predicates, a per-sender [`Cooldown`], before/after
//! hooks and per-kind error handlers. Entries are assembled with a consuming
//! builder and become immutable once registered:
//!
//! ```no_run
//! use std::time::Duration;
//! use trellis::Command;
//!
//! let ping = Command::new("ping", |ctx| async move { ctx.reply("Pong!").await })
//!     .description("Replies with Pong!")
//!     .cooldown(2, Duration::from_secs(15));
//! ```
//!
//! # Invocation pipeline
//!
//! ```text
//! cooldown → checks → before hook → handler → after hook
//! ```
//!
//! The first failing stage aborts the invocation with an [`Error`] that is
//! routed through the command's error handlers, then the bot's.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures::future::BoxFuture;

use crate::{
    context::Context,
    errors::{Error, ErrorKind},
};

/// Future type returned by boxed handlers.
pub type HandlerFuture = BoxFuture<'static, Result<(), Error>>;

/// Boxed command handler.
pub(crate) type Callback = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync>;

/// Boxed check predicate.
pub(crate) type Check = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<bool, Error>> + Send + Sync>;

/// Boxed command-level error handler.
pub(crate) type ErrorCallback = Arc<dyn Fn(Context, Error) -> BoxFuture<'static, ()> + Send + Sync>;

/// Boxes a user closure into a [`Callback`].
pub(crate) fn boxed_handler<F, Fut>(handler: F) -> Callback
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(handler(ctx)))
}

/// Boxes a user closure into a [`Check`].
pub(crate) fn boxed_check<F, Fut>(check: F) -> Check
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, Error>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(check(ctx)))
}

/// Boxes a user closure into an [`ErrorCallback`].
pub(crate) fn boxed_error_handler<F, Fut>(handler: F) -> ErrorCallback
where
    F: Fn(Context, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx, error| Box::pin(handler(ctx, error)))
}

/// A registered command.
///
/// Built with [`Command::new`] and the builder methods, registered on a
/// [`crate::Bot`], a [`crate::Group`] or an [`crate::Extension`]. Never
/// mutated after registration.
pub struct Command {
    /// Trigger name, matched against the first word after the prefix
    name: String,
    /// The handler invoked on a match
    handler: Callback,
    /// Short description shown by the help command
    description: String,
    /// Usage override; derived from the name when absent
    usage: Option<String>,
    /// Check predicates gating the invocation
    checks: Vec<Check>,
    /// Optional per-sender rate limit
    cooldown: Option<Cooldown>,
    /// Hook run before the handler
    before: Option<Callback>,
    /// Hook run after the handler
    after: Option<Callback>,
    /// Error handlers keyed by kind
    error_handlers: HashMap<ErrorKind, ErrorCallback>,
    /// Catch-all error handler
    fallback_error_handler: Option<ErrorCallback>,
}

impl Command {
    /// Creates a command with a trigger name and an async handler.
    ///
    /// The handler receives the invocation [`Context`] and reports failures
    /// as [`Error`] values, which flow through the error-handler chain.
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Command {
            name: name.into(),
            handler: boxed_handler(handler),
            description: String::new(),
            usage: None,
            checks: Vec::new(),
            cooldown: None,
            before: None,
            after: None,
            error_handlers: HashMap::new(),
            fallback_error_handler: None,
        }
    }

    /// Sets the description shown by the help command.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Overrides the usage string shown by the help command.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Adds a check predicate. All checks must return `true` for the
    /// handler to run; a `false` aborts with [`Error::CheckFailed`].
    pub fn check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Error>> + Send + 'static,
    {
        self.checks.push(boxed_check(check));
        self
    }

    /// Limits the command to `rate` invocations per `period` and sender.
    pub fn cooldown(mut self, rate: u32, period: Duration) -> Self {
        self.cooldown = Some(Cooldown::new(rate, period));
        self
    }

    /// Registers a hook run before the handler, after the checks.
    pub fn before_invoke<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.before = Some(boxed_handler(hook));
        self
    }

    /// Registers a hook run after the handler returned successfully.
    pub fn after_invoke<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.after = Some(boxed_handler(hook));
        self
    }

    /// Registers an error handler for a specific [`ErrorKind`].
    pub fn on_error<F, Fut>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(Context, Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.error_handlers.insert(kind, boxed_error_handler(handler));
        self
    }

    /// Registers a catch-all error handler, consulted when no kind-specific
    /// handler matches.
    pub fn on_any_error<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Context, Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.fallback_error_handler = Some(boxed_error_handler(handler));
        self
    }

    /// Returns the trigger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, empty when unset.
    pub fn description_text(&self) -> &str {
        &self.description
    }

    /// Returns the usage string, deriving `{prefix}{name}` when unset.
    pub fn usage_text(&self, prefix: &str) -> String {
        match &self.usage {
            Some(usage) => usage.clone(),
            None => format!("{prefix}{}", self.name),
        }
    }

    /// Runs the cooldown and the check predicates without invoking the
    /// handler. Groups use this to gate subcommand dispatch.
    pub(crate) async fn run_checks(&self, ctx: &Context) -> Result<(), Error> {
        if let Some(cooldown) = &self.cooldown {
            cooldown.hit(&ctx.sender)?;
        }

        for check in &self.checks {
            if !check(ctx.clone()).await? {
                return Err(Error::CheckFailed {
                    command: self.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Runs the invocation pipeline: cooldown, checks, hooks, handler.
    pub(crate) async fn invoke(&self, ctx: Context) -> Result<(), Error> {
        self.run_checks(&ctx).await?;

        if let Some(before) = &self.before {
            before(ctx.clone()).await?;
        }

        (self.handler)(ctx.clone()).await?;

        if let Some(after) = &self.after {
            after(ctx).await?;
        }

        Ok(())
    }

    /// Routes an invocation error through this command's handlers.
    ///
    /// Returns `None` when a handler consumed the error, otherwise hands the
    /// error back for bot-level handling.
    pub(crate) async fn dispatch_error(&self, ctx: Context, error: Error) -> Option<Error> {
        if let Some(handler) = self.error_handlers.get(&error.kind()) {
            handler(ctx, error).await;
            return None;
        }
        if let Some(handler) = &self.fallback_error_handler {
            handler(ctx, error).await;
            return None;
        }
        Some(error)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("checks", &self.checks.len())
            .field("cooldown", &self.cooldown.is_some())
            .finish()
    }
}

/// Per-sender sliding-window rate limit.
///
/// At most `rate` invocations are allowed per `period` and sender; the next
/// invocation inside the window fails with [`Error::Cooldown`] carrying the
/// time left until the oldest tracked call expires.
pub struct Cooldown {
    /// Allowed invocations per window
    rate: u32,
    /// Window length
    period: Duration,
    /// Invocation timestamps per sender
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Cooldown {
    /// Creates a cooldown allowing `rate` invocations per `period`.
    pub fn new(rate: u32, period: Duration) -> Self {
        Cooldown {
            rate,
            period,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Records an invocation attempt by `sender`.
    ///
    /// # Errors
    ///
    /// [`Error::Cooldown`] when the sender exhausted the window.
    pub fn hit(&self, sender: &str) -> Result<(), Error> {
        let now = Instant::now();
        let mut calls = self.calls.lock().expect("cooldown lock poisoned");
        let timestamps = calls.entry(sender.to_string()).or_default();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.period {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.rate as usize {
            let oldest = *timestamps.front().expect("window cannot be empty");
            let retry_after = self.period.saturating_sub(now.duration_since(oldest));
            return Err(Error::Cooldown { retry_after });
        }

        timestamps.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{bot::testing, events::MessageEvent, messenger::MockMessenger};

    fn context() -> Context {
        let bot = testing::handle(Arc::new(MockMessenger::new()));
        Context::from_message(
            bot,
            "!room:example.org",
            None,
            &MessageEvent {
                sender: "@alice:example.org".to_string(),
                body: "!test".to_string(),
                event_id: "$event:example.org".to_string(),
                timestamp: chrono::Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn test_invoke_runs_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler_counter = Arc::clone(&counter);
        let command = Command::new("test", move |_ctx| {
            let counter = Arc::clone(&handler_counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        command.invoke(context()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_check_blocks_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler_counter = Arc::clone(&counter);
        let command = Command::new("test", move |_ctx| {
            let counter = Arc::clone(&handler_counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .check(|_ctx| async move { Ok(false) });

        let result = command.invoke(context()).await;
        assert!(matches!(result, Err(Error::CheckFailed { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_passing_check_allows_handler() {
        let command = Command::new("test", |_ctx| async move { Ok(()) })
            .check(|_ctx| async move { Ok(true) });

        assert!(command.invoke(context()).await.is_ok());
    }

    #[tokio::test]
    async fn test_hooks_run_around_handler() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let before_order = Arc::clone(&order);
        let handler_order = Arc::clone(&order);
        let after_order = Arc::clone(&order);

        let command = Command::new("test", move |_ctx| {
            let order = Arc::clone(&handler_order);
            async move {
                order.lock().unwrap().push("handler");
                Ok(())
            }
        })
        .before_invoke(move |_ctx| {
            let order = Arc::clone(&before_order);
            async move {
                order.lock().unwrap().push("before");
                Ok(())
            }
        })
        .after_invoke(move |_ctx| {
            let order = Arc::clone(&after_order);
            async move {
                order.lock().unwrap().push("after");
                Ok(())
            }
        });

        command.invoke(context()).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["before", "handler", "after"]);
    }

    #[tokio::test]
    async fn test_cooldown_limits_invocations() {
        let command = Command::new("test", |_ctx| async move { Ok(()) })
            .cooldown(2, Duration::from_secs(60));

        assert!(command.invoke(context()).await.is_ok());
        assert!(command.invoke(context()).await.is_ok());

        let result = command.invoke(context()).await;
        assert!(matches!(result, Err(Error::Cooldown { .. })));
    }

    #[tokio::test]
    async fn test_dispatch_error_prefers_kind_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let kind_hits = Arc::clone(&hits);

        let command = Command::new("test", |_ctx| async move { Ok(()) }).on_error(
            ErrorKind::Cooldown,
            move |_ctx, _error| {
                let hits = Arc::clone(&kind_hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        let error = Error::Cooldown {
            retry_after: Duration::from_secs(1),
        };
        let leftover = command.dispatch_error(context(), error).await;
        assert!(leftover.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_error_falls_back() {
        let hits = Arc::new(AtomicUsize::new(0));
        let fallback_hits = Arc::clone(&hits);

        let command =
            Command::new("test", |_ctx| async move { Ok(()) }).on_any_error(move |_ctx, _error| {
                let hits = Arc::clone(&fallback_hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            });

        let leftover = command
            .dispatch_error(context(), Error::handler("boom"))
            .await;
        assert!(leftover.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_error_unhandled_is_returned() {
        let command = Command::new("test", |_ctx| async move { Ok(()) });
        let leftover = command
            .dispatch_error(context(), Error::handler("boom"))
            .await;
        assert!(matches!(leftover, Some(Error::Handler(_))));
    }

    #[test]
    fn test_usage_defaults_to_prefixed_name() {
        let command = Command::new("ping", |_ctx| async move { Ok(()) });
        assert_eq!(command.usage_text("!"), "!ping");

        let command = Command::new("ping", |_ctx| async move { Ok(()) }).usage("!ping [loud]");
        assert_eq!(command.usage_text("!"), "!ping [loud]");
    }

    #[test]
    fn test_cooldown_window_slides() {
        let cooldown = Cooldown::new(1, Duration::from_millis(10));
        assert!(cooldown.hit("@alice:example.org").is_ok());

        let error = cooldown.hit("@alice:example.org").unwrap_err();
        assert!(matches!(error, Error::Cooldown { .. }));

        std::thread::sleep(Duration::from_millis(15));
        assert!(cooldown.hit("@alice:example.org").is_ok());
    }

    #[test]
    fn test_cooldown_is_per_sender() {
        let cooldown = Cooldown::new(1, Duration::from_secs(60));
        assert!(cooldown.hit("@alice:example.org").is_ok());
        assert!(cooldown.hit("@bob:example.org").is_ok());
        assert!(cooldown.hit("@alice:example.org").is_err());
    }

    #[test]
    fn test_cooldown_reports_retry_after() {
        let cooldown = Cooldown::new(1, Duration::from_secs(60));
        cooldown.hit("@alice:example.org").unwrap();

        match cooldown.hit("@alice:example.org") {
            Err(Error::Cooldown { retry_after }) => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(59));
            }
            other => panic!("expected cooldown error, got {other:?}"),
        }
    }
}
