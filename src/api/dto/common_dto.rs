//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};

/// Error envelope returned by the storefront backend.
///
/// The backend is not consistent about the key, so both `message` and
/// `error` are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable error message.
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Creates an error body with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Best-effort extraction of the message from a raw response body.
    ///
    /// Falls back to the trimmed body text when it is not a JSON envelope,
    /// and to an empty string for an empty body.
    #[must_use]
    pub fn message_from(raw: &str) -> String {
        serde_json::from_str::<Self>(raw)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| raw.trim().chars().take(200).collect())
    }
}

/// Empty JSON object sent as the body of `PUT` state changes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyBody {}
