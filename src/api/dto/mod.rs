//! Data Transfer Objects for REST request/response serialization.
//!
//! Conversation and message documents decode straight into the domain
//! types; only request bodies and error envelopes need their own shapes.

pub mod common_dto;
pub mod message_dto;

pub use common_dto::*;
pub use message_dto::*;
