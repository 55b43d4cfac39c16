//! Live channel frames.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::domain::{Message, UserId};

/// A frame exchanged over the live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SocketFrame {
    /// Client → server: announce the user this socket belongs to.
    Register(UserId),
    /// Server → client: a message was stored in a conversation the user
    /// participates in.
    NewMessage(Message),
}

impl SocketFrame {
    /// Returns the event name as a static string slice.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::NewMessage(_) => "new-message",
        }
    }

    /// Serializes the frame to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Outcome of decoding an inbound text frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// A frame this client understands.
    Known(SocketFrame),
    /// A well-formed frame with an event name this client does not handle.
    Unknown(String),
    /// Not a frame at all.
    Malformed(String),
}

impl InboundFrame {
    /// Decodes an inbound text frame.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<SocketFrame>(text) {
            Ok(frame) => Self::Known(frame),
            Err(err) => match serde_json::from_str::<serde_json::Value>(text) {
                Ok(value) => match value.get("event").and_then(|e| e.as_str()) {
                    Some(name) if name != "new-message" && name != "register" => {
                        Self::Unknown(name.to_string())
                    }
                    _ => Self::Malformed(err.to_string()),
                },
                Err(_) => Self::Malformed(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn register_wire_shape() {
        let frame = SocketFrame::Register(UserId::from("u1"));
        let Ok(json) = frame.to_json() else {
            panic!("serialization failed");
        };
        assert_eq!(json, r#"{"event":"register","data":"u1"}"#);
        assert_eq!(frame.event_name(), "register");
    }

    #[test]
    fn parses_new_message() {
        let text = r#"{"event":"new-message","data":{"_id":"m1","conversation":"c1","sender":"u2","senderType":"Admin","content":"hi","timestamp":"2024-03-01T10:00:00Z","isRead":false}}"#;
        let InboundFrame::Known(SocketFrame::NewMessage(msg)) = InboundFrame::parse(text) else {
            panic!("expected new-message frame");
        };
        assert_eq!(msg.content(), "hi");
        assert_eq!(msg.conversation_id().as_str(), "c1");
    }

    #[test]
    fn unknown_event_is_reported_by_name() {
        let InboundFrame::Unknown(name) = InboundFrame::parse(r#"{"event":"typing","data":{}}"#)
        else {
            panic!("expected unknown frame");
        };
        assert_eq!(name, "typing");
    }

    #[test]
    fn broken_payload_is_malformed() {
        assert!(matches!(
            InboundFrame::parse(r#"{"event":"new-message","data":{"content":1}}"#),
            InboundFrame::Malformed(_)
        ));
        assert!(matches!(InboundFrame::parse("not json"), InboundFrame::Malformed(_)));
    }
}
