use std::future::Future;

use super::identity::{Identity, LoginDetails, NewProfile, Profile};
use crate::types::{Role, UserId};

/// Failure of the profile backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile not found")]
    NotFound,
    #[error("profile data corrupted: {0}")]
    Corrupt(String),
    /// Another profile already uses this email address.
    #[error("email already belongs to another profile")]
    EmailTaken,
}

/// Reads the ambient request credential.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, if any. Has no side effects.
    fn current_identity(&self) -> impl Future<Output = Option<Identity>> + Send;

    /// Forget the credential.
    fn sign_out(&self) -> impl Future<Output = ()> + Send;
}

/// Persistent profile records.
pub trait ProfileStore: Send + Sync {
    fn get_profile(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    fn count_with_role(&self, role: Role) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn insert_profile(
        &self,
        profile: NewProfile,
    ) -> impl Future<Output = Result<Profile, StoreError>> + Send;

    /// Refresh email, name and avatar and stamp `last_login_at`. Never touches the role.
    fn record_login(
        &self,
        id: UserId,
        details: &LoginDetails,
    ) -> impl Future<Output = Result<Profile, StoreError>> + Send;

    fn set_role(
        &self,
        id: UserId,
        role: Role,
    ) -> impl Future<Output = Result<Profile, StoreError>> + Send;

    /// Every profile, oldest first.
    fn list_profiles(&self) -> impl Future<Output = Result<Vec<Profile>, StoreError>> + Send;
}
