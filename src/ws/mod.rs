//! Live channel: socket lifecycle, frame codec, multicast subscriptions.
//!
//! A single WebSocket per session carries the `register` handshake upstream
//! and `new-message` pushes downstream. Pushed messages are fanned out to
//! every [`LiveFeed`] through the session's event bus.

pub mod connection;
pub mod manager;
pub mod messages;
pub mod subscription;

pub use manager::{ConnectionManager, ConnectionState};
pub use messages::SocketFrame;
pub use subscription::LiveFeed;
