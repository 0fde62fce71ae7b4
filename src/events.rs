//! Event kinds and payloads delivered to event handlers.
//!
//! Handlers register for an [`EventKind`] and receive `(Room, Event)` pairs.
//! The payload structs carry the subset of the SDK event data handlers
//! actually consume, so handler code and tests never touch ruma types.
//!
//! Membership events fan out twice: once for the specific transition
//! (join, leave, invite, ban, kick) and once for [`EventKind::MemberChange`],
//! which fires for every membership update.

use chrono::{DateTime, Utc};
use matrix_sdk::ruma::events::room::member::MembershipState;

/// The kinds of room events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A text message was posted in a joined room
    Message,
    /// A reaction was added to an event
    Reaction,
    /// The set of typing users changed
    Typing,
    /// A user joined a room
    MemberJoin,
    /// A user left a room on their own
    MemberLeave,
    /// A user was invited to a room
    MemberInvite,
    /// A user was banned from a room
    MemberBan,
    /// A user was kicked from a room
    MemberKick,
    /// Any membership update, fired in addition to the specific kind
    MemberChange,
}

/// A room event delivered to registered handlers.
#[derive(Debug, Clone)]
pub enum Event {
    /// See [`MessageEvent`]
    Message(MessageEvent),
    /// See [`ReactionEvent`]
    Reaction(ReactionEvent),
    /// See [`MemberEvent`]
    Member(MemberEvent),
    /// See [`TypingEvent`]
    Typing(TypingEvent),
}

impl Event {
    /// Get the message payload if this is a message event.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Event::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Get the reaction payload if this is a reaction event.
    pub fn as_reaction(&self) -> Option<&ReactionEvent> {
        match self {
            Event::Reaction(reaction) => Some(reaction),
            _ => None,
        }
    }

    /// Get the membership payload if this is a member event.
    pub fn as_member(&self) -> Option<&MemberEvent> {
        match self {
            Event::Member(member) => Some(member),
            _ => None,
        }
    }

    /// Get the typing payload if this is a typing event.
    pub fn as_typing(&self) -> Option<&TypingEvent> {
        match self {
            Event::Typing(typing) => Some(typing),
            _ => None,
        }
    }
}

/// A text message posted in a joined room.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// User id of the author
    pub sender: String,
    /// Message body
    pub body: String,
    /// Event id of the message
    pub event_id: String,
    /// Server timestamp of the message
    pub timestamp: DateTime<Utc>,
}

/// A reaction added to an event.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    /// User id of the reacting user
    pub sender: String,
    /// Reaction key, usually an emoji
    pub key: String,
    /// Event id of the annotated event
    pub relates_to: String,
    /// Event id of the reaction itself
    pub event_id: String,
    /// Server timestamp of the reaction
    pub timestamp: DateTime<Utc>,
}

/// A membership update in a room.
#[derive(Debug, Clone)]
pub struct MemberEvent {
    /// User id that caused the update
    pub sender: String,
    /// User id whose membership changed
    pub user_id: String,
    /// The specific transition that occurred
    pub kind: EventKind,
    /// Event id of the member event
    pub event_id: String,
    /// Server timestamp of the update
    pub timestamp: DateTime<Utc>,
}

/// The set of users currently typing in a room.
#[derive(Debug, Clone)]
pub struct TypingEvent {
    /// User ids currently typing
    pub user_ids: Vec<String>,
}

/// Classifies a membership transition into the specific [`EventKind`].
///
/// `sender` is the user that issued the state change, `target` the user the
/// change applies to. A leave issued by someone other than the target is a
/// kick.
pub(crate) fn classify_membership(
    prev: Option<&MembershipState>,
    current: &MembershipState,
    sender: &str,
    target: &str,
) -> Option<EventKind> {
    match current {
        MembershipState::Join => Some(EventKind::MemberJoin),
        MembershipState::Invite => Some(EventKind::MemberInvite),
        MembershipState::Ban => Some(EventKind::MemberBan),
        MembershipState::Leave => {
            if sender != target {
                return Some(EventKind::MemberKick);
            }
            // An unban shows up as ban -> leave issued by the target's
            // moderator or the target; only count real departures.
            match prev {
                Some(MembershipState::Ban) => None,
                _ => Some(EventKind::MemberLeave),
            }
        }
        _ => None,
    }
}
