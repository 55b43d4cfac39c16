//! Who is talking: authenticated identity, roles and participants.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Role of the authenticated storefront user.
///
/// Supplied by the auth collaborator. `User` is a customer; `Admin` and
/// `Agent` are support staff with system-wide conversation visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    /// Storefront customer.
    User,
    /// Store administrator.
    Admin,
    /// Support agent.
    Agent,
}

impl UserRole {
    /// Returns `true` for roles allowed to see every conversation.
    #[must_use]
    pub const fn is_support(self) -> bool {
        matches!(self, Self::Admin | Self::Agent)
    }

    /// Parses a role name as issued in auth tokens (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" | "customer" => Some(Self::User),
            "admin" => Some(Self::Admin),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "User",
            Self::Admin => "Admin",
            Self::Agent => "Agent",
        };
        f.write_str(s)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Authenticated user id.
    pub user_id: UserId,
    /// Role granted by the auth collaborator.
    pub role: UserRole,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Shorthand for a customer identity.
    #[must_use]
    pub fn customer(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, UserRole::User)
    }

    /// Shorthand for an administrator identity.
    #[must_use]
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, UserRole::Admin)
    }
}

/// A conversation participant or message sender.
///
/// The backend sends either a bare id string or a populated user document;
/// both decode into this type. Only the id takes part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ParticipantRepr")]
pub struct Participant {
    /// User id.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Given name, when the user document was populated.
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name, when the user document was populated.
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Contact email, when the user document was populated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account role, when the user document was populated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl Participant {
    /// Creates a participant known only by id.
    #[must_use]
    pub fn from_id(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            email: None,
            role: None,
        }
    }

    /// Human readable name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.id.to_string(),
        }
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Participant {}

impl From<&Identity> for Participant {
    fn from(identity: &Identity) -> Self {
        Self {
            role: Some(identity.role),
            ..Self::from_id(identity.user_id.clone())
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParticipantRepr {
    Id(UserId),
    Populated {
        #[serde(rename = "_id")]
        id: UserId,
        #[serde(rename = "firstName", default)]
        first_name: Option<String>,
        #[serde(rename = "lastName", default)]
        last_name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default, deserialize_with = "lenient_role")]
        role: Option<UserRole>,
    },
}

impl From<ParticipantRepr> for Participant {
    fn from(repr: ParticipantRepr) -> Self {
        match repr {
            ParticipantRepr::Id(id) => Self::from_id(id),
            ParticipantRepr::Populated {
                id,
                first_name,
                last_name,
                email,
                role,
            } => Self {
                id,
                first_name,
                last_name,
                email,
                role,
            },
        }
    }
}

/// Unknown role strings in populated user documents are ignored.
fn lenient_role<'de, D>(deserializer: D) -> Result<Option<UserRole>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(UserRole::parse))
}
