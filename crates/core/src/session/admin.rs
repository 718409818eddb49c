use serde::Serialize;
use tracing::{info, warn};

use super::identity::Profile;
use super::ports::{ProfileStore, StoreError};
use crate::types::{Role, UserId};

/// Rejected role change, serialized as `{ "error": "..." }`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{error}")]
pub struct RoleChangeError {
    pub error: String,
}

impl RoleChangeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl From<StoreError> for RoleChangeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::new("User not found"),
            other => {
                warn!(error = %other, "Role change failed in profile store");
                Self::new("Could not update role, please try again")
            }
        }
    }
}

/// Change `target`'s role on behalf of `actor`.
///
/// Only admins may change roles, never their own, and the last admin cannot
/// be demoted. Every failure comes back as a [`RoleChangeError`].
///
/// # Errors
///
/// Returns [`RoleChangeError`] carrying a user-facing message.
pub async fn change_role<P: ProfileStore>(
    store: &P,
    actor: &Profile,
    target: UserId,
    requested: &str,
) -> Result<Profile, RoleChangeError> {
    if actor.role != Role::Admin {
        return Err(RoleChangeError::new("Only admins can change roles"));
    }
    let role: Role = requested
        .trim()
        .parse()
        .map_err(|_| RoleChangeError::new(format!("Unknown role: {}", requested.trim())))?;
    if actor.id == target {
        return Err(RoleChangeError::new("You cannot change your own role"));
    }

    let current = store
        .get_profile(target)
        .await?
        .ok_or_else(|| RoleChangeError::new("User not found"))?;
    if current.role == role {
        return Ok(current);
    }
    if current.role == Role::Admin && store.count_with_role(Role::Admin).await? <= 1 {
        return Err(RoleChangeError::new("Cannot demote the last admin"));
    }

    let updated = store.set_role(target, role).await?;
    info!(
        actor = %actor.id,
        target = %target,
        from = %current.role,
        to = %role,
        "Role changed"
    );
    Ok(updated)
}
