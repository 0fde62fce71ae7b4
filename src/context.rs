//! Per-invocation context passed to command handlers and checks.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::{bot::BotHandle, errors::Error, events::MessageEvent, room::Room};

/// Execution context for a single command invocation.
///
/// A `Context` is built for each incoming message, handed to the matching
/// handler and discarded when the handler returns. It exposes the triggering
/// message (sender, body, room, timestamp), the parsed command name and
/// arguments, and the reply operations.
///
/// Cloning is cheap; the handle back to the bot is shared.
///
/// # Examples
///
/// ```no_run
/// # use trellis::{Context, Error};
/// async fn ping(ctx: Context) -> Result<(), Error> {
///     println!("{} invoked {} in {}", ctx.sender, ctx.body, ctx.room_id);
///     ctx.reply("Pong!").await
/// }
/// ```
#[derive(Clone)]
pub struct Context {
    /// Handle back to the running bot
    bot: BotHandle,
    /// User id of the message author
    pub sender: String,
    /// Full message body
    pub body: String,
    /// Id of the room the message was posted in
    pub room_id: String,
    /// Display name of the room, when known
    pub room_name: Option<String>,
    /// Event id of the triggering message
    pub event_id: String,
    /// Server timestamp of the triggering message
    pub timestamp: DateTime<Utc>,
    /// Parsed command name, `None` when the message is not a command
    pub command: Option<String>,
    /// Arguments following the command name
    pub args: Vec<String>,
}

impl Context {
    /// Builds a context from an incoming message, extracting the command
    /// name and arguments when the body starts with the bot prefix.
    pub(crate) fn from_message(
        bot: BotHandle,
        room_id: impl Into<String>,
        room_name: Option<String>,
        message: &MessageEvent,
    ) -> Self {
        let prefix = bot.prefix().to_string();
        let (command, args) = match message.body.strip_prefix(prefix.as_str()) {
            Some(rest) if !prefix.is_empty() => {
                let mut parts = parse_args(rest);
                if parts.is_empty() {
                    (None, Vec::new())
                } else {
                    let name = parts.remove(0).to_lowercase();
                    (Some(name), parts)
                }
            }
            _ => (None, Vec::new()),
        };

        Context {
            bot,
            sender: message.sender.clone(),
            body: message.body.clone(),
            room_id: room_id.into(),
            room_name,
            event_id: message.event_id.clone(),
            timestamp: message.timestamp,
            command,
            args,
        }
    }

    /// Returns the handle to the running bot.
    pub fn bot(&self) -> &BotHandle {
        &self.bot
    }

    /// Returns the bot's command prefix.
    pub fn prefix(&self) -> &str {
        self.bot.prefix()
    }

    /// Returns a handle on the room the message was posted in.
    pub fn room(&self) -> Room {
        self.bot.room(&self.room_id)
    }

    /// Replies to the triggering message.
    pub async fn reply(&self, message: &str) -> Result<(), Error> {
        self.room()
            .send_content(crate::content::MessageContent::reply(
                message,
                &self.event_id,
                &self.sender,
            ))
            .await
    }

    /// Sends a markdown message to the room, without the reply relation.
    pub async fn send(&self, message: &str) -> Result<(), Error> {
        self.room().send(message).await
    }

    /// Reacts to the triggering message with `key`.
    pub async fn react(&self, key: &str) -> Result<(), Error> {
        self.room().react(&self.event_id, key).await
    }

    /// Converts the positional argument at `index` to `T`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingArgument`] when the message carried fewer arguments,
    /// [`Error::InvalidArgument`] when the conversion fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use trellis::{Context, Error};
    /// async fn add(ctx: Context) -> Result<(), Error> {
    ///     let a: i64 = ctx.arg(0)?;
    ///     let b: i64 = ctx.arg(1)?;
    ///     ctx.reply(&format!("{a} + {b} = {}", a + b)).await
    /// }
    /// ```
    pub fn arg<T: FromStr>(&self, index: usize) -> Result<T, Error> {
        let raw = self
            .args
            .get(index)
            .ok_or(Error::MissingArgument { index })?;
        raw.parse().map_err(|_| Error::InvalidArgument {
            index,
            value: raw.clone(),
        })
    }

    /// Converts the positional argument at `index` to `T`, falling back to
    /// `default` when the argument is absent.
    pub fn arg_or<T: FromStr>(&self, index: usize, default: T) -> Result<T, Error> {
        match self.args.get(index) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| Error::InvalidArgument {
                index,
                value: raw.clone(),
            }),
        }
    }
}

/// Splits an argument string on whitespace, keeping quoted segments intact.
///
/// Both single and double quotes are recognised; quotes themselves are not
/// part of the produced arguments.
pub(crate) fn parse_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';

    for c in input.chars() {
        match c {
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = c;
            }
            c if c == quote_char && in_quotes => {
                in_quotes = false;
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        bot::testing,
        content::MessageContent,
        messenger::MockMessenger,
    };

    fn message(body: &str) -> MessageEvent {
        MessageEvent {
            sender: "@alice:example.org".to_string(),
            body: body.to_string(),
            event_id: "$event:example.org".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn context(body: &str, messenger: MockMessenger) -> Context {
        let bot = testing::handle(Arc::new(messenger));
        Context::from_message(bot, "!room:example.org", Some("lobby".to_string()), &message(body))
    }

    #[test]
    fn test_command_extraction() {
        let ctx = context("!ping", MockMessenger::new());
        assert_eq!(ctx.command.as_deref(), Some("ping"));
        assert!(ctx.args.is_empty());
    }

    #[test]
    fn test_command_name_is_lowercased() {
        let ctx = context("!PING loud", MockMessenger::new());
        assert_eq!(ctx.command.as_deref(), Some("ping"));
        assert_eq!(ctx.args, vec!["loud"]);
    }

    #[test]
    fn test_non_command_message() {
        let ctx = context("just chatting", MockMessenger::new());
        assert_eq!(ctx.command, None);
        assert!(ctx.args.is_empty());
        assert_eq!(ctx.body, "just chatting");
    }

    #[test]
    fn test_bare_prefix_is_not_a_command() {
        let ctx = context("!", MockMessenger::new());
        assert_eq!(ctx.command, None);
    }

    #[test]
    fn test_quoted_arguments_stay_joined() {
        let ctx = context("!echo \"hello there\" tail", MockMessenger::new());
        assert_eq!(ctx.command.as_deref(), Some("echo"));
        assert_eq!(ctx.args, vec!["hello there", "tail"]);
    }

    #[test]
    fn test_arg_conversion() {
        let ctx = context("!div 10 2", MockMessenger::new());
        assert_eq!(ctx.arg::<i64>(0).unwrap(), 10);
        assert_eq!(ctx.arg::<i64>(1).unwrap(), 2);
    }

    #[test]
    fn test_arg_missing() {
        let ctx = context("!div 10", MockMessenger::new());
        let result = ctx.arg::<i64>(1);
        assert!(matches!(result, Err(Error::MissingArgument { index: 1 })));
    }

    #[test]
    fn test_arg_invalid() {
        let ctx = context("!div ten 2", MockMessenger::new());
        let result = ctx.arg::<i64>(0);
        assert!(matches!(
            result,
            Err(Error::InvalidArgument { index: 0, .. })
        ));
    }

    #[test]
    fn test_arg_or_default() {
        let ctx = context("!help", MockMessenger::new());
        assert_eq!(ctx.arg_or::<usize>(0, 1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reply_relates_to_triggering_event() {
        let mut messenger = MockMessenger::new();
        messenger
            .expect_send_message()
            .withf(|room_id, content| {
                room_id == "!room:example.org"
                    && *content
                        == MessageContent::reply(
                            "Pong!",
                            "$event:example.org",
                            "@alice:example.org",
                        )
            })
            .once()
            .returning(|_, _| Ok(()));

        let ctx = context("!ping", messenger);
        ctx.reply("Pong!").await.unwrap();
    }

    #[tokio::test]
    async fn test_react_targets_triggering_event() {
        let mut messenger = MockMessenger::new();
        messenger
            .expect_send_reaction()
            .withf(|_, event_id, key| event_id == "$event:example.org" && key == "🙏")
            .once()
            .returning(|_, _, _| Ok(()));

        let ctx = context("thanks", messenger);
        ctx.react("🙏").await.unwrap();
    }

    #[test]
    fn test_parse_args_plain() {
        assert_eq!(parse_args("a b c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_args_quotes() {
        assert_eq!(
            parse_args("say 'hello world' now"),
            vec!["say", "hello world", "now"]
        );
    }

    #[test]
    fn test_parse_args_empty() {
        assert!(parse_args("").is_empty());
        assert!(parse_args("   ").is_empty());
    }
}
