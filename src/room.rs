//! Room handle for sending messages, reactions and invitations.

use std::sync::Arc;

use crate::{content::MessageContent, errors::Error, messenger::Messenger};

/// A handle on a Matrix room.
///
/// Rooms are cheap to clone and obtained from a [`crate::Context`], a
/// [`crate::BotHandle`] or an incoming event dispatch. All operations go
/// through the bot's [`Messenger`].
///
/// # Examples
///
/// ```no_run
/// # use trellis::Room;
/// # async fn example(room: Room) -> Result<(), trellis::Error> {
/// room.send("**Good morning!**").await?;
/// room.react("$event:example.org", "👍").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Room {
    /// Identifier of the room
    room_id: String,
    /// Outbound transport shared with the bot
    messenger: Arc<dyn Messenger>,
}

impl Room {
    /// Builds a room handle.
    pub(crate) fn new(room_id: impl Into<String>, messenger: Arc<dyn Messenger>) -> Self {
        Room {
            room_id: room_id.into(),
            messenger,
        }
    }

    /// Returns the room identifier.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Sends a markdown-formatted message to the room.
    pub async fn send(&self, message: &str) -> Result<(), Error> {
        self.messenger
            .send_message(&self.room_id, MessageContent::markdown(message))
            .await
    }

    /// Sends a plain-text message to the room, skipping markdown rendering.
    pub async fn send_plain(&self, message: &str) -> Result<(), Error> {
        self.messenger
            .send_message(&self.room_id, MessageContent::text(message))
            .await
    }

    /// Sends a notice to the room.
    pub async fn notice(&self, message: &str) -> Result<(), Error> {
        self.messenger
            .send_message(&self.room_id, MessageContent::notice(message))
            .await
    }

    /// Sends a prepared [`MessageContent`] payload to the room.
    pub async fn send_content(&self, content: MessageContent) -> Result<(), Error> {
        self.messenger.send_message(&self.room_id, content).await
    }

    /// Reacts to an event in the room with `key`, usually an emoji.
    pub async fn react(&self, event_id: &str, key: &str) -> Result<(), Error> {
        self.messenger
            .send_reaction(&self.room_id, event_id, key)
            .await
    }

    /// Invites a user to the room.
    pub async fn invite_user(&self, user_id: &str) -> Result<(), Error> {
        self.messenger.invite_user(&self.room_id, user_id).await
    }
}
