//! Outgoing message payloads.
//!
//! [`MessageContent`] is the plain-data description of everything a bot can
//! post into a room. The [`crate::messenger`] module maps these onto the
//! SDK's wire types when a message is actually sent, which keeps handler and
//! dispatch code testable without a homeserver.

use matrix_sdk::ruma::{
    EventId, UserId,
    events::room::message::{
        AddMentions, ForwardThread, ReplacementMetadata, ReplyMetadata, RoomMessageEventContent,
    },
};

use crate::errors::Error;

/// An outgoing room message payload.
///
/// # Examples
///
/// ```
/// use trellis::MessageContent;
///
/// let content = MessageContent::markdown("**bold** move");
/// assert!(matches!(content, MessageContent::Markdown(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text message.
    Text(String),
    /// Markdown-formatted message, rendered to HTML by the SDK.
    Markdown(String),
    /// Notice message. Clients render notices subdued and other bots
    /// conventionally ignore them.
    Notice(String),
    /// Reply to an existing event.
    Reply {
        /// Markdown body of the reply
        body: String,
        /// Event id of the message being replied to
        in_reply_to: String,
        /// User id of the original message's sender
        sender: String,
    },
    /// Replacement of a previously sent event.
    Edit {
        /// New plain-text body
        body: String,
        /// Event id of the message being replaced
        replaces: String,
    },
}

impl MessageContent {
    /// Plain text payload.
    pub fn text(body: impl Into<String>) -> Self {
        MessageContent::Text(body.into())
    }

    /// Markdown payload.
    pub fn markdown(body: impl Into<String>) -> Self {
        MessageContent::Markdown(body.into())
    }

    /// Notice payload.
    pub fn notice(body: impl Into<String>) -> Self {
        MessageContent::Notice(body.into())
    }

    /// Reply payload targeting `in_reply_to`, sent by `sender`.
    pub fn reply(
        body: impl Into<String>,
        in_reply_to: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        MessageContent::Reply {
            body: body.into(),
            in_reply_to: in_reply_to.into(),
            sender: sender.into(),
        }
    }

    /// Edit payload replacing the event `replaces`.
    pub fn edit(body: impl Into<String>, replaces: impl Into<String>) -> Self {
        MessageContent::Edit {
            body: body.into(),
            replaces: replaces.into(),
        }
    }

    /// Returns the human-readable body of the payload.
    pub fn body(&self) -> &str {
        match self {
            MessageContent::Text(body)
            | MessageContent::Markdown(body)
            | MessageContent::Notice(body)
            | MessageContent::Reply { body, .. }
            | MessageContent::Edit { body, .. } => body,
        }
    }

    /// Converts the payload into the SDK event content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Id`] if a reply target or sender id fails to parse.
    pub(crate) fn into_event_content(self) -> Result<RoomMessageEventContent, Error> {
        match self {
            MessageContent::Text(body) => Ok(RoomMessageEventContent::text_plain(body)),
            MessageContent::Markdown(body) => Ok(RoomMessageEventContent::text_markdown(body)),
            MessageContent::Notice(body) => Ok(RoomMessageEventContent::notice_plain(body)),
            MessageContent::Reply {
                body,
                in_reply_to,
                sender,
            } => {
                let event_id = EventId::parse(&in_reply_to)?;
                let sender = UserId::parse(&sender)?;
                Ok(RoomMessageEventContent::text_markdown(body).make_reply_to(
                    ReplyMetadata::new(&event_id, &sender, None),
                    ForwardThread::No,
                    AddMentions::No,
                ))
            }
            MessageContent::Edit { body, replaces } => {
                let event_id = EventId::parse(&replaces)?;
                Ok(RoomMessageEventContent::text_plain(body)
                    .make_replacement(ReplacementMetadata::new(event_id, None)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_accessor() {
        assert_eq!(MessageContent::text("hello").body(), "hello");
        assert_eq!(MessageContent::notice("psst").body(), "psst");
        assert_eq!(
            MessageContent::reply("pong", "$event:example.org", "@user:example.org").body(),
            "pong"
        );
    }

    #[test]
    fn test_text_into_event_content() {
        let content = MessageContent::text("hello")
            .into_event_content()
            .unwrap();
        assert_eq!(content.body(), "hello");
    }

    #[test]
    fn test_reply_requires_valid_ids() {
        let result = MessageContent::reply("pong", "not an event id", "@user:example.org")
            .into_event_content();
        assert!(matches!(result, Err(Error::Id(_))));

        let result = MessageContent::reply("pong", "$event:example.org", "not a user id")
            .into_event_content();
        assert!(matches!(result, Err(Error::Id(_))));
    }

    #[test]
    fn test_reply_into_event_content() {
        let content = MessageContent::reply("pong", "$event:example.org", "@user:example.org")
            .into_event_content()
            .unwrap();
        assert_eq!(content.body(), "pong");
    }

    #[test]
    fn test_edit_into_event_content() {
        let content = MessageContent::edit("fixed", "$event:example.org")
            .into_event_content()
            .unwrap();
        // Edits carry a fallback body prefixed with "* ".
        assert!(content.body().contains("fixed"));
    }
}
