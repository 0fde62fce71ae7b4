//! Configuration file structures for trellis bots.
//!
//! Bots are configured with a YAML file loaded once at startup. Every value
//! can be overridden through environment variables carrying the `TRELLIS_`
//! prefix, which keeps credentials out of files checked into source control.
//!
//! # Configuration File Format
//!
//! ```yaml
//! # Homeserver the bot account is registered with
//! homeserver: "https://matrix.org"
//!
//! # Fully qualified Matrix user ID of the bot account
//! user_id: "@bot:matrix.org"
//!
//! # One of password or token must be provided
//! password: "secret-password"
//! # token: "syt_..."
//!
//! # Command prefix, defaults to "!"
//! prefix: "!"
//! ```
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export TRELLIS_PASSWORD="secret-from-env"
//! export TRELLIS_HOMESERVER="https://example.org"
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

use crate::errors::Error;

/// Default homeserver when the configuration omits one.
const DEFAULT_HOMESERVER: &str = "https://matrix.org";

/// Default command prefix when the configuration omits one.
const DEFAULT_PREFIX: &str = "!";

/// Bot configuration loaded from YAML with environment overrides.
///
/// Loaded once by [`Config::load`] and read-only afterwards. Exactly one of
/// `password` or `token` is required; `homeserver` and `prefix` fall back to
/// their defaults when omitted.
///
/// # Examples
///
/// ```no_run
/// use trellis::Config;
///
/// let config = Config::load("config.yaml").unwrap();
/// assert_eq!(config.prefix, "!");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URL of the homeserver the bot account is registered with.
    #[serde(default = "default_homeserver")]
    pub homeserver: String,

    /// Fully qualified Matrix user ID, e.g. `@bot:matrix.org`.
    pub user_id: String,

    /// Account password, used for a fresh login.
    #[serde(default)]
    pub password: Option<String>,

    /// Access token, used to restore an existing session instead of
    /// logging in with a password.
    #[serde(default)]
    pub token: Option<String>,

    /// Command prefix messages must start with to be treated as commands.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_homeserver() -> String {
    DEFAULT_HOMESERVER.to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Config {
    /// Loads the configuration from a YAML file.
    ///
    /// Values from the environment (prefix `TRELLIS_`) override values from
    /// the file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or a field fails
    /// to deserialize, and [`Error::MissingCredentials`] if neither
    /// `password` nor `token` is set.
    pub fn load(path: &str) -> Result<Self, Error> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TRELLIS_"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration carries usable credentials.
    pub fn validate(&self) -> Result<(), Error> {
        if self.password.is_none() && self.token.is_none() {
            return Err(Error::MissingCredentials);
        }
        Ok(())
    }
}
