//! Message request DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::ConversationId;

/// Request body for `POST /messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Conversation to post into.
    pub conversation_id: ConversationId,
    /// Message text.
    pub content: String,
}
