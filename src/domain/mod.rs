//! Domain layer: identifiers, conversations, messages, roles and events.
//!
//! This module contains the client-side chat model: the conversation and
//! message projections of backend documents, the identity and capability
//! types that gate conversation visibility, and the event bus that fans
//! live socket traffic out to every consumer.

pub mod capability;
pub mod chat_event;
pub mod conversation;
pub mod event_bus;
pub mod identity;
pub mod ids;
pub mod message;

pub use capability::{Capability, CustomerView, SupportView};
pub use chat_event::ChatEvent;
pub use conversation::{Conversation, ConversationPolicy, ConversationStatus};
pub use event_bus::EventBus;
pub use identity::{Identity, Participant, UserRole};
pub use ids::{ConversationId, MessageId, UserId};
pub use message::{Message, SenderRole};
