//! Service layer: the chat core.
//!
//! [`ConversationDirectory`] lists conversations per capability,
//! [`MessageStream`] orders history and live messages,
//! [`LifecycleController`] starts and ends conversations and
//! [`ChatViewBinder`] keeps the view on one conversation. [`ChatClient`]
//! owns all of them for one session.

pub mod chat_client;
pub mod directory;
pub mod lifecycle;
pub mod message_stream;
pub mod view_binder;

pub use chat_client::{ChatClient, LiveUpdate};
pub use directory::{ConversationDirectory, StatusFilter};
pub use lifecycle::LifecycleController;
pub use message_stream::{LiveOutcome, LoadTicket, MessageStream};
pub use view_binder::{BindContext, ChatViewBinder};
