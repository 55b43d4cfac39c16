//! Support conversation projection and its status machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, Participant, UserId};
use crate::error::ChatError;

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// A customer and support are talking.
    Active,
    /// Opened by the customer, no agent has picked it up yet.
    Waiting,
    /// Ended by either party. Terminal unless reopening is allowed.
    Closed,
}

impl ConversationStatus {
    /// All statuses, in display order.
    pub const ALL: [Self; 3] = [Self::Active, Self::Waiting, Self::Closed];

    /// Returns `true` while the conversation accepts messages.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Legal: `active → closed`, `waiting → active`, `waiting → closed`.
    /// `closed → active | waiting` only when `policy.allow_reopen`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self, policy: &ConversationPolicy) -> bool {
        match (self, next) {
            (Self::Active, Self::Closed)
            | (Self::Waiting, Self::Active)
            | (Self::Waiting, Self::Closed) => true,
            (Self::Closed, Self::Active | Self::Waiting) => policy.allow_reopen,
            _ => false,
        }
    }

    /// Parses the wire name (`"active"`, `"waiting"`, `"closed"`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "waiting" => Some(Self::Waiting),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Policy knobs for behaviour the backend contract leaves open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPolicy {
    /// Accept `closed → active | waiting` transitions.
    pub allow_reopen: bool,
    /// Let `start` return a locally known open conversation of the
    /// customer instead of asking the backend.
    pub reuse_open_conversation: bool,
}

/// Client-side projection of a backend conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id")]
    id: ConversationId,
    #[serde(default)]
    participants: Vec<Participant>,
    status: ConversationStatus,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "closedAt", default, skip_serializing_if = "Option::is_none")]
    closed_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Creates an active conversation.
    #[must_use]
    pub fn new(
        id: ConversationId,
        participants: Vec<Participant>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            participants,
            status: ConversationStatus::Active,
            created_at,
            updated_at: created_at,
            closed_at: None,
        }
    }

    /// Replaces the status without validation.
    ///
    /// Meant for building snapshots that mirror backend state (seeding,
    /// fixtures). Live state changes go through [`Self::transition_to`].
    #[must_use]
    pub fn with_status(mut self, status: ConversationStatus) -> Self {
        self.status = status;
        if status == ConversationStatus::Closed && self.closed_at.is_none() {
            self.closed_at = Some(self.updated_at);
        }
        self
    }

    /// Conversation id.
    #[must_use]
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ConversationStatus {
        self.status
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last change.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Timestamp the conversation was closed, if it was.
    #[must_use]
    pub const fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns `true` if `user_id` is one of the participants.
    #[must_use]
    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| &p.id == user_id)
    }

    /// Adds a participant if not already present.
    pub fn add_participant(&mut self, participant: Participant) {
        if !self.participants.contains(&participant) {
            self.participants.push(participant);
        }
    }

    /// Case-insensitive substring match against participant ids.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches_participant(&self, needle: &str) -> bool {
        self.participants
            .iter()
            .any(|p| p.id.as_str().to_lowercase().contains(needle))
    }

    /// Applies a validated status change.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidTransition`] when `policy` forbids moving
    /// from the current status to `next`. The conversation is unchanged on
    /// error.
    pub fn transition_to(
        &mut self,
        next: ConversationStatus,
        at: DateTime<Utc>,
        policy: &ConversationPolicy,
    ) -> Result<(), ChatError> {
        if !self.status.can_transition_to(next, policy) {
            return Err(ChatError::InvalidTransition {
                conversation_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        self.closed_at = match next {
            ConversationStatus::Closed => Some(at),
            ConversationStatus::Active | ConversationStatus::Waiting => None,
        };
        Ok(())
    }
}
