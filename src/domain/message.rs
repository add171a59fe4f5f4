//! Chat messages and the events they produce on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: Uuid,
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Author of the message.
    pub sender_id: String,
    /// Message text.
    pub body: String,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A message that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Author of the message.
    pub sender_id: String,
    /// Message text.
    pub body: String,
}

/// Topic names published on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    /// A message was sent to a conversation.
    MessageSent,
}

/// Event published on the bus after a mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusEvent {
    /// A message was stored and should reach its conversation's subscribers.
    MessageSent(Message),
}

impl BusEvent {
    /// Returns the topic this event is published under.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::MessageSent(_) => Topic::MessageSent,
        }
    }
}
