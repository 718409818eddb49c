use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, Role, UserId};

/// The authenticated principal carried by the request credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Denormalized `app.profile` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub email: Email,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    /// Stored for administrators; guards do not consult it.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.email.as_str())
    }
}

/// A profile about to be inserted on first login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: UserId,
    pub email: Email,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// Fields refreshed from the identity provider on every login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDetails {
    pub email: Email,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&Identity> for LoginDetails {
    fn from(identity: &Identity) -> Self {
        Self {
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            avatar_url: identity.avatar_url.clone(),
        }
    }
}
