//! Chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, MessageId, Participant, UserRole};

/// Role the sender spoke in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SenderRole {
    /// A customer.
    User,
    /// A store administrator.
    Admin,
    /// A support agent.
    Agent,
}

impl From<UserRole> for SenderRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => Self::User,
            UserRole::Admin => Self::Admin,
            UserRole::Agent => Self::Agent,
        }
    }
}

/// A single chat message.
///
/// Immutable once created; the only mutation is [`Message::mark_read`],
/// which can flip the read flag from `false` to `true` and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<MessageId>,
    conversation: ConversationId,
    sender: Participant,
    #[serde(rename = "senderType")]
    sender_role: SenderRole,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(rename = "isRead", default)]
    is_read: bool,
}

impl Message {
    /// Creates an unread message without an id.
    #[must_use]
    pub fn new(
        conversation: ConversationId,
        sender: Participant,
        sender_role: SenderRole,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            conversation,
            sender,
            sender_role,
            content: content.into(),
            timestamp,
            is_read: false,
        }
    }

    /// Attaches the backend-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Backend-assigned id, if the payload carried one.
    #[must_use]
    pub fn id(&self) -> Option<&MessageId> {
        self.id.as_ref()
    }

    /// Conversation this message belongs to.
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation
    }

    /// Sender of the message.
    #[must_use]
    pub fn sender(&self) -> &Participant {
        &self.sender
    }

    /// Role the sender spoke in.
    #[must_use]
    pub const fn sender_role(&self) -> SenderRole {
        self.sender_role
    }

    /// Text content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the message has been read.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.is_read
    }

    /// Marks the message read. Idempotent.
    pub fn mark_read(&mut self) {
        self.is_read = true;
    }

    /// Returns `true` if both values describe the same backend message.
    ///
    /// Only ids are compared. A message without an id is never the same as
    /// any other.
    #[must_use]
    pub fn is_same_message(&self, other: &Self) -> bool {
        matches!((&self.id, &other.id), (Some(a), Some(b)) if a == b)
    }

    /// Returns `true` if conversation, sender, timestamp and content all
    /// match. Ids are ignored.
    #[must_use]
    pub fn has_same_content(&self, other: &Self) -> bool {
        self.conversation == other.conversation
            && self.sender == other.sender
            && self.timestamp == other.timestamp
            && self.content == other.content
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn message(content: &str) -> Message {
        Message::new(
            ConversationId::from("c1"),
            Participant::from_id("u1"),
            SenderRole::User,
            content,
            Utc::now(),
        )
    }

    #[test]
    fn decodes_backend_document() {
        let json = r#"{
            "_id": "m1",
            "conversation": "c1",
            "sender": {"_id": "u1", "firstName": "Ali", "role": "User"},
            "senderType": "Agent",
            "content": "How can I help?",
            "timestamp": "2024-03-01T10:00:00Z",
            "isRead": false
        }"#;
        let Ok(msg) = serde_json::from_str::<Message>(json) else {
            panic!("message should decode");
        };
        assert_eq!(msg.id(), Some(&MessageId::from("m1")));
        assert_eq!(msg.sender_role(), SenderRole::Agent);
        assert_eq!(msg.sender().display_name(), "Ali");
        assert!(!msg.is_read());
    }

    #[test]
    fn missing_read_flag_defaults_to_unread() {
        let json = r#"{"conversation":"c1","sender":"u1","senderType":"User","content":"hi","timestamp":"2024-03-01T10:00:00Z"}"#;
        let Ok(msg) = serde_json::from_str::<Message>(json) else {
            panic!("message should decode");
        };
        assert!(msg.id().is_none());
        assert!(!msg.is_read());
    }

    #[test]
    fn mark_read_is_monotonic() {
        let mut msg = message("hello");
        msg.mark_read();
        msg.mark_read();
        assert!(msg.is_read());
    }

    #[test]
    fn identity_by_id_when_present() {
        let a = message("one").with_id(MessageId::from("m1"));
        let b = message("two").with_id(MessageId::from("m1"));
        let c = message("one").with_id(MessageId::from("m2"));
        assert!(a.is_same_message(&b));
        assert!(!a.is_same_message(&c));
    }

    #[test]
    fn messages_without_ids_are_never_the_same() {
        let a = message("same");
        let b = a.clone();
        let saved = a.clone().with_id(MessageId::from("m9"));
        assert!(!a.is_same_message(&b));
        assert!(!a.is_same_message(&saved));
        assert!(a.has_same_content(&b));
        assert!(a.has_same_content(&saved));

        let mut other = a.clone();
        other.content = "different".to_string();
        assert!(!a.has_same_content(&other));
    }
}
