//! Outbound messaging abstraction over the Matrix client.
//!
//! Handlers never talk to [`matrix_sdk::Client`] directly; they go through
//! the [`Messenger`] trait, which [`MatrixMessenger`] implements for real
//! traffic and [`MockMessenger`] replaces in tests.

use async_trait::async_trait;
use log::debug;
use matrix_sdk::{
    Client,
    ruma::{
        EventId, RoomId, UserId,
        events::{reaction::ReactionEventContent, relation::Annotation},
    },
};
use mockall::automock;

use crate::{content::MessageContent, errors::Error};

/// Outbound operations a bot can perform against a room.
///
/// The trait abstracts the Matrix client for easier testing with mocks.
#[automock]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a message payload to a room.
    async fn send_message(&self, room_id: &str, content: MessageContent) -> Result<(), Error>;
    /// Sends a reaction with `key` to the event `event_id`.
    async fn send_reaction(&self, room_id: &str, event_id: &str, key: &str) -> Result<(), Error>;
    /// Invites a user to a room.
    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<(), Error>;
}

/// [`Messenger`] implementation backed by a [`matrix_sdk::Client`].
pub struct MatrixMessenger {
    /// The authenticated Matrix client
    client: Client,
}

impl MatrixMessenger {
    /// Wraps an authenticated client.
    pub fn new(client: Client) -> Self {
        MatrixMessenger { client }
    }

    /// Resolves a joined room by id.
    fn room(&self, room_id: &str) -> Result<matrix_sdk::Room, Error> {
        let room_id = RoomId::parse(room_id)?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| Error::RoomNotFound {
                room_id: room_id.to_string(),
            })
    }
}

#[async_trait]
impl Messenger for MatrixMessenger {
    async fn send_message(&self, room_id: &str, content: MessageContent) -> Result<(), Error> {
        debug!("sending message to {}: {}", room_id, content.body());

        let room = self.room(room_id)?;
        room.send(content.into_event_content()?).await?;
        Ok(())
    }

    async fn send_reaction(&self, room_id: &str, event_id: &str, key: &str) -> Result<(), Error> {
        debug!("reacting to {} in {} with {}", event_id, room_id, key);

        let room = self.room(room_id)?;
        let event_id = EventId::parse(event_id)?;
        let content = ReactionEventContent::new(Annotation::new(event_id, key.to_string()));
        room.send(content).await?;
        Ok(())
    }

    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<(), Error> {
        debug!("inviting {} to {}", user_id, room_id);

        let room = self.room(room_id)?;
        let user_id = UserId::parse(user_id)?;
        room.invite_user_by_id(&user_id).await?;
        Ok(())
    }
}
