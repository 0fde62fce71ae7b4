//! Error types for the trellis framework.
//!
//! All fallible operations in the crate return [`Error`]. The variants split
//! into two families:
//!
//! - **Dispatch errors** raised while routing an incoming message to a
//!   command handler ([`Error::CommandNotFound`], [`Error::MissingArgument`],
//!   [`Error::Cooldown`], ...). These flow through the error-handler chain
//!   (command handlers first, then bot handlers) instead of stopping the
//!   sync loop.
//! - **Startup errors** raised before the sync loop runs
//!   ([`Error::Config`], [`Error::MissingCredentials`], [`Error::Matrix`]).
//!
//! Error handlers are registered per [`ErrorKind`], the discriminant-only
//! view of [`Error`]:
//!
//! ```no_run
//! # use trellis::{Bot, ErrorKind};
//! # fn example(bot: &mut Bot) {
//! bot.on_error(ErrorKind::CommandNotFound, |error| async move {
//!     log::warn!("unknown command: {error}");
//! });
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the trellis framework.
#[derive(Debug, Error)]
pub enum Error {
    /// The message used the command prefix but no command matches the name.
    #[error("command '{name}' not found")]
    CommandNotFound {
        /// The unmatched command name
        name: String,
    },

    /// A command, group or subcommand with the same trigger already exists.
    #[error("'{name}' is already registered")]
    AlreadyRegistered {
        /// The duplicated trigger name
        name: String,
    },

    /// The handler requested a positional argument the message did not carry.
    #[error("missing required argument #{index}")]
    MissingArgument {
        /// Zero-based position of the missing argument
        index: usize,
    },

    /// A positional argument failed to convert to the requested type.
    #[error("invalid value '{value}' for argument #{index}")]
    InvalidArgument {
        /// Zero-based position of the argument
        index: usize,
        /// The raw value that failed to convert
        value: String,
    },

    /// The sender invoked the command again inside its cooldown window.
    #[error("on cooldown, try again in {:.1}s", .retry_after.as_secs_f32())]
    Cooldown {
        /// Time left until the command may be invoked again
        retry_after: Duration,
    },

    /// A check predicate rejected the invocation.
    #[error("a check rejected command '{command}'")]
    CheckFailed {
        /// Name of the gated command
        command: String,
    },

    /// A schedule expression did not parse as 5-field cron.
    #[error("invalid cron expression '{expr}'")]
    InvalidCron {
        /// The rejected expression
        expr: String,
    },

    /// The target room is unknown to the client.
    #[error("room '{room_id}' not found")]
    RoomNotFound {
        /// The unresolved room id
        room_id: String,
    },

    /// Neither a password nor an access token was configured.
    #[error("either password or token must be set in the configuration")]
    MissingCredentials,

    /// A user, room or event identifier failed to parse.
    #[error(transparent)]
    Id(#[from] matrix_sdk::ruma::IdParseError),

    /// Configuration loading or extraction failed.
    #[error(transparent)]
    Config(#[from] Box<figment::Error>),

    /// An error reported by the underlying Matrix client.
    #[error(transparent)]
    Matrix(#[from] Box<matrix_sdk::Error>),

    /// An HTTP-level error from the homeserver.
    #[error(transparent)]
    Http(#[from] Box<matrix_sdk::HttpError>),

    /// The Matrix client could not be constructed.
    #[error(transparent)]
    ClientBuild(#[from] Box<matrix_sdk::ClientBuildError>),

    /// A failure reported by user handler code.
    #[error("{0}")]
    Handler(String),
}

impl Error {
    /// Builds a [`Error::Handler`] from any displayable message.
    ///
    /// Meant for handler code that wants to abort an invocation with its own
    /// message and have it routed through the registered error handlers.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }

    /// Returns the [`ErrorKind`] discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CommandNotFound { .. } => ErrorKind::CommandNotFound,
            Error::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            Error::MissingArgument { .. } => ErrorKind::MissingArgument,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Cooldown { .. } => ErrorKind::Cooldown,
            Error::CheckFailed { .. } => ErrorKind::CheckFailed,
            Error::InvalidCron { .. } => ErrorKind::InvalidCron,
            Error::RoomNotFound { .. } => ErrorKind::RoomNotFound,
            Error::MissingCredentials => ErrorKind::MissingCredentials,
            Error::Id(_) => ErrorKind::Id,
            Error::Config(_) => ErrorKind::Config,
            Error::Matrix(_) => ErrorKind::Matrix,
            Error::Http(_) => ErrorKind::Http,
            Error::ClientBuild(_) => ErrorKind::ClientBuild,
            Error::Handler(_) => ErrorKind::Handler,
        }
    }

    /// Returns true for the argument errors that warrant a usage reply.
    pub(crate) fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Error::MissingArgument { .. } | Error::InvalidArgument { .. }
        )
    }
}

impl From<figment::Error> for Error {
    fn from(error: figment::Error) -> Self {
        Error::Config(Box::new(error))
    }
}

impl From<matrix_sdk::Error> for Error {
    fn from(error: matrix_sdk::Error) -> Self {
        Error::Matrix(Box::new(error))
    }
}

impl From<matrix_sdk::HttpError> for Error {
    fn from(error: matrix_sdk::HttpError) -> Self {
        Error::Http(Box::new(error))
    }
}

impl From<matrix_sdk::ClientBuildError> for Error {
    fn from(error: matrix_sdk::ClientBuildError) -> Self {
        Error::ClientBuild(Box::new(error))
    }
}

/// Discriminant-only view of [`Error`], used to key error handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::CommandNotFound`]
    CommandNotFound,
    /// See [`Error::AlreadyRegistered`]
    AlreadyRegistered,
    /// See [`Error::MissingArgument`]
    MissingArgument,
    /// See [`Error::InvalidArgument`]
    InvalidArgument,
    /// See [`Error::Cooldown`]
    Cooldown,
    /// See [`Error::CheckFailed`]
    CheckFailed,
    /// See [`Error::InvalidCron`]
    InvalidCron,
    /// See [`Error::RoomNotFound`]
    RoomNotFound,
    /// See [`Error::MissingCredentials`]
    MissingCredentials,
    /// See [`Error::Id`]
    Id,
    /// See [`Error::Config`]
    Config,
    /// See [`Error::Matrix`]
    Matrix,
    /// See [`Error::Http`]
    Http,
    /// See [`Error::ClientBuild`]
    ClientBuild,
    /// See [`Error::Handler`]
    Handler,
}
