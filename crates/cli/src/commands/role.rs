//! Staff role commands.
//!
//! Profiles are created on first sign-in, so the user must have signed in
//! once before a role can be assigned. This is how the first admin is made;
//! later changes go through the dashboard.

use handset_core::{Email, Role};
use handset_storefront::db::{ProfileRepository, RepositoryError};

use super::{ConnectError, connect};

#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid role: {0}. Valid roles: admin, editor, seo_manager, customer")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No profile for {0}; the user must sign in once first")]
    UnknownUser(String),

    #[error("{0} is the last admin and cannot be demoted")]
    LastAdmin(String),
}

/// Assign `role` to the profile signed in as `email`.
pub async fn set(email: &str, role: &str) -> Result<(), RoleError> {
    let role: Role = role
        .parse()
        .map_err(|_| RoleError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| RoleError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let profiles = ProfileRepository::new(&pool);

    let profile = profiles
        .get_by_email(&email)
        .await?
        .ok_or_else(|| RoleError::UnknownUser(email.to_string()))?;

    if profile.role == role {
        tracing::info!("{} already has role {}", email, role);
        return Ok(());
    }

    if profile.role == Role::Admin && profiles.count_with_role(Role::Admin).await? <= 1 {
        return Err(RoleError::LastAdmin(email.to_string()));
    }

    let updated = profiles.set_role(profile.id, role).await?;
    tracing::info!(
        "Role updated: {} ({}) {} -> {}",
        updated.display_name(),
        updated.email,
        profile.role,
        updated.role
    );
    Ok(())
}

/// Log every profile with a staff role.
pub async fn list() -> Result<(), RoleError> {
    let pool = connect().await?;
    let profiles = ProfileRepository::new(&pool).list_all().await?;

    let staff: Vec<_> = profiles.iter().filter(|p| p.role.is_staff()).collect();
    tracing::info!("Staff ({} of {} profiles)", staff.len(), profiles.len());
    for profile in staff {
        tracing::info!(
            "  {:<12} {} <{}>",
            profile.role.as_str(),
            profile.display_name(),
            profile.email
        );
    }
    Ok(())
}
