//! Trellis - a command framework for Matrix bots.
//!
//! Trellis wraps [`matrix_sdk`] with a registration-based API for building
//! chat bots: commands with checks and cooldowns, room event subscription,
//! scheduled tasks and a built-in paginated help command. The Matrix
//! client-server protocol, end-to-end encryption and sync management stay
//! entirely with the wrapped SDK.
//!
//! # Features
//!
//! - **Commands**: prefix-triggered handlers with typed argument access,
//!   registered under unique names
//! - **Groups**: parent commands with named subcommands
//! - **Checks**: per-command and global predicates gating execution
//! - **Cooldowns**: per-sender sliding-window rate limits
//! - **Events**: handlers for messages, reactions, typing and membership
//!   changes
//! - **Scheduler**: cron-expression tasks that can post into rooms
//! - **Error handling**: per-kind handlers at command and bot level; the
//!   event loop survives any handler failure
//! - **Extensions**: reusable bundles of commands merged into a bot at
//!   startup
//! - **YAML configuration**: credentials and prefix from a file, overridable
//!   through `TRELLIS_`-prefixed environment variables
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! homeserver: "https://matrix.org"
//! user_id: "@bot:matrix.org"
//! password: "your-password"
//! prefix: "!"
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use trellis::{Bot, Command, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trellis::Error> {
//!     env_logger::init();
//!
//!     let mut bot = Bot::new(Config::load("config.yaml")?);
//!
//!     bot.command(Command::new("ping", |ctx| async move {
//!         ctx.reply("Pong!").await
//!     }))?;
//!
//!     bot.run().await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`bot`] - login, the sync loop and command dispatch
//! - [`command`] - command entries, checks, cooldowns and hooks
//! - [`config`] - YAML configuration loading with environment overrides
//! - [`context`] - the per-invocation value object passed to handlers
//! - [`events`] - event kinds and payloads for event handlers
//! - [`extension`] - reusable registration bundles
//! - [`group`] - commands with subcommands
//! - [`help`] - the built-in paginated help command
//! - [`registry`] - the shared registration store
//! - [`room`] - the room handle used for sending and reacting
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - controls logging verbosity of the `log` facade; the
//!   binary embedding the bot picks the logger implementation

pub mod bot;
pub mod command;
pub mod config;
pub mod content;
pub mod context;
pub mod errors;
pub mod events;
pub mod extension;
pub mod group;
pub mod help;
pub mod messenger;
pub mod registry;
pub mod room;
mod scheduler;

pub use crate::bot::{Bot, BotHandle};
pub use crate::command::{Command, Cooldown, HandlerFuture};
pub use crate::config::Config;
pub use crate::content::MessageContent;
pub use crate::context::Context;
pub use crate::errors::{Error, ErrorKind};
pub use crate::events::{
    Event, EventKind, MemberEvent, MessageEvent, ReactionEvent, TypingEvent,
};
pub use crate::extension::Extension;
pub use crate::group::Group;
pub use crate::help::{DefaultHelp, HelpFormatter, Page, Paginator};
pub use crate::messenger::Messenger;
pub use crate::registry::{Entry, Registry};
pub use crate::room::Room;
