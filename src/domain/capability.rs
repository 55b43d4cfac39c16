//! Role-typed access to conversation listings.
//!
//! The role is inspected exactly once, when a [`Capability`] is derived
//! from an [`Identity`]. Afterwards the type of the view decides which
//! listing call is reachable: only a [`SupportView`] can ask the backend
//! for every conversation in the system.

use super::{Conversation, Identity, UserId};

/// Customer-scoped view: sees only conversations the user takes part in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerView {
    user_id: UserId,
}

impl CustomerView {
    /// The customer this view belongs to.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Drops every conversation the customer does not participate in.
    ///
    /// The backend already scopes `GET /conversations` to the caller; this
    /// keeps a misbehaving response from leaking other users' chats into
    /// the directory.
    #[must_use]
    pub fn retain_own(&self, conversations: Vec<Conversation>) -> Vec<Conversation> {
        let before = conversations.len();
        let own: Vec<Conversation> = conversations
            .into_iter()
            .filter(|c| c.has_participant(&self.user_id))
            .collect();
        let dropped = before - own.len();
        if dropped > 0 {
            tracing::warn!(
                user_id = %self.user_id,
                dropped,
                "discarded conversations not owned by the customer"
            );
        }
        own
    }
}

/// Support-scoped view: sees every conversation in the system.
///
/// Can only be obtained through [`Capability::for_identity`] with a
/// support role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportView {
    user_id: UserId,
}

impl SupportView {
    /// The staff member this view belongs to.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

/// Conversation visibility granted to the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Own conversations only.
    Customer(CustomerView),
    /// All conversations.
    Support(SupportView),
}

impl Capability {
    /// Derives the capability for an authenticated identity.
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        let user_id = identity.user_id.clone();
        if identity.role.is_support() {
            Self::Support(SupportView { user_id })
        } else {
            Self::Customer(CustomerView { user_id })
        }
    }

    /// The user this capability was issued to.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::Customer(view) => view.user_id(),
            Self::Support(view) => view.user_id(),
        }
    }

    /// Returns `true` for the support view.
    #[must_use]
    pub const fn is_support(&self) -> bool {
        matches!(self, Self::Support(_))
    }
}
