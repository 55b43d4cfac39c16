//! Events published by the live channel.
//!
//! The socket task emits a [`ChatEvent`] through the [`super::EventBus`]
//! for every pushed message and for every connection state change. All
//! subscribers see all events.

use chrono::{DateTime, Utc};

use super::{ConversationId, Message, UserId};

/// Event observed on the live channel.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The socket is up and the `register` frame has been queued.
    Connected {
        /// User the session registered as.
        user_id: UserId,
        /// Time the connection was established.
        timestamp: DateTime<Utc>,
    },

    /// The server pushed a `new-message` frame.
    MessageReceived(Message),

    /// The socket closed, either on request or because the transport failed.
    Disconnected {
        /// Human readable cause.
        reason: String,
        /// `true` when the client asked for the teardown.
        requested: bool,
        /// Time the connection closed.
        timestamp: DateTime<Utc>,
    },
}

impl ChatEvent {
    /// Returns the conversation a message event belongs to.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            Self::MessageReceived(message) => Some(message.conversation_id()),
            Self::Connected { .. } | Self::Disconnected { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::MessageReceived(_) => "message_received",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}
