//! REST layer: the backend seam, its HTTP implementation and DTOs.
//!
//! All endpoints are relative to the configured API base URL.

pub mod backend;
pub mod dto;
pub mod http;
pub mod memory;

pub use backend::ChatBackend;
pub use http::HttpChatBackend;
pub use memory::{ChatStore, InMemoryBackend};
