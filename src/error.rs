//! Chat client error types.
//!
//! [`ChatError`] is the central error type for the chat core. Every variant
//! belongs to one [`ErrorKind`] of the taxonomy below and carries a stable
//! numeric code so UI layers can map failures without matching on strings.

use std::fmt;

use crate::domain::{ConversationId, ConversationStatus};

/// Broad failure category of a [`ChatError`].
///
/// | Kind       | Meaning                                              |
/// |------------|------------------------------------------------------|
/// | Transport  | Live channel failed, dropped, or is absent            |
/// | Request    | A REST call did not succeed (status, network, decode) |
/// | Stale      | A response arrived after the view moved on            |
/// | Validation | Rejected locally before any request was issued        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection failed to establish, dropped, or does not exist.
    Transport,
    /// A REST call returned non-success or never completed.
    Request,
    /// A response that must be discarded without being applied.
    Stale,
    /// Local precondition failed.
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Request => "request",
            Self::Stale => "stale",
            Self::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// Client-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Kind       |
/// |-----------|------------|
/// | 1000–1999 | Validation |
/// | 2000–2999 | Request    |
/// | 3000–3999 | Transport  |
/// | 4000–4999 | Stale      |
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The live channel could not be established or broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// An operation needed the live channel but none is connected.
    #[error("not connected to the chat server")]
    NotConnected,

    /// The backend answered with a non-success status.
    #[error("{operation} failed with status {status}: {message}")]
    Request {
        /// Logical operation name (e.g. `"close_conversation"`).
        operation: &'static str,
        /// HTTP status code returned by the backend.
        status: u16,
        /// Message extracted from the error body, or the status reason.
        message: String,
    },

    /// The HTTP request failed before a response was received.
    #[error("{operation} request failed: {source}")]
    Http {
        /// Logical operation name.
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout.
    #[error("{operation} timed out")]
    Timeout {
        /// Logical operation name.
        operation: &'static str,
    },

    /// The response body could not be decoded.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        /// Logical operation name.
        operation: &'static str,
        /// Decoder error message.
        message: String,
    },

    /// A history response arrived for a view that is no longer current.
    #[error("stale response for conversation {conversation_id}")]
    StaleResponse {
        /// Conversation the response was issued for.
        conversation_id: ConversationId,
    },

    /// The requested status change is not allowed.
    #[error("conversation {conversation_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Conversation being transitioned.
        conversation_id: ConversationId,
        /// Current status.
        from: ConversationStatus,
        /// Requested status.
        to: ConversationStatus,
    },

    /// The conversation is closed and accepts no new messages.
    #[error("conversation {0} is closed")]
    ConversationClosed(ConversationId),

    /// No conversation is selected.
    #[error("no active conversation")]
    NoActiveConversation,

    /// Message content was empty after trimming whitespace.
    #[error("message content is empty")]
    EmptyMessage,

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::NotConnected => ErrorKind::Transport,
            Self::Request { .. }
            | Self::Http { .. }
            | Self::Timeout { .. }
            | Self::Decode { .. } => ErrorKind::Request,
            Self::StaleResponse { .. } => ErrorKind::Stale,
            Self::InvalidTransition { .. }
            | Self::ConversationClosed(_)
            | Self::NoActiveConversation
            | Self::EmptyMessage
            | Self::Config(_) => ErrorKind::Validation,
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::EmptyMessage => 1001,
            Self::NoActiveConversation => 1002,
            Self::ConversationClosed(_) => 1003,
            Self::InvalidTransition { .. } => 1004,
            Self::Config(_) => 1005,
            Self::Request { .. } => 2001,
            Self::Http { .. } => 2002,
            Self::Timeout { .. } => 2003,
            Self::Decode { .. } => 2004,
            Self::Transport(_) => 3001,
            Self::NotConnected => 3002,
            Self::StaleResponse { .. } => 4001,
        }
    }

    /// Returns the HTTP status carried by a [`ChatError::Request`], if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this error must be dropped without surfacing it.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self.kind(), ErrorKind::Stale)
    }

    /// Short text suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transport => {
                "Chat is offline. Reconnect and try again.".to_string()
            }
            ErrorKind::Request => match self {
                Self::Timeout { .. } => "The server took too long to respond.".to_string(),
                Self::Request { message, .. } if !message.is_empty() => message.clone(),
                _ => "Something went wrong. Please try again.".to_string(),
            },
            ErrorKind::Stale => String::new(),
            ErrorKind::Validation => self.to_string(),
        }
    }
}
