//! In-memory adapters for the session ports, used by tests and the CLI's
//! dry runs.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use super::identity::{Identity, LoginDetails, NewProfile, Profile};
use super::ports::{IdentityProvider, ProfileStore, StoreError};
use crate::types::{Email, Role, UserId};

/// A fixed credential. Clones share state, so `sign_out` is visible to all.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    identity: Arc<Mutex<Option<Identity>>>,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity: Arc::new(Mutex::new(identity)),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_out(&self) {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Profiles held in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<Mutex<Vec<Profile>>>,
}

impl MemoryProfileStore {
    fn with_profiles<T>(&self, f: impl FnOnce(&mut Vec<Profile>) -> T) -> T {
        f(&mut self.profiles.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn update(
        &self,
        id: UserId,
        f: impl FnOnce(&mut Profile),
    ) -> Result<Profile, StoreError> {
        self.with_profiles(|profiles| {
            let profile = profiles
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(StoreError::NotFound)?;
            f(profile);
            Ok(profile.clone())
        })
    }
}

/// Case-insensitive, like the `LOWER(email)` unique index.
fn email_taken(profiles: &[Profile], owner: UserId, email: &Email) -> bool {
    profiles
        .iter()
        .any(|p| p.id != owner && p.email.as_str().eq_ignore_ascii_case(email.as_str()))
}

impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.with_profiles(|profiles| profiles.iter().find(|p| p.id == id).cloned()))
    }

    async fn count_with_role(&self, role: Role) -> Result<u64, StoreError> {
        Ok(self.with_profiles(|profiles| {
            profiles.iter().filter(|p| p.role == role).count() as u64
        }))
    }

    async fn insert_profile(&self, new: NewProfile) -> Result<Profile, StoreError> {
        self.with_profiles(|profiles| {
            if profiles.iter().any(|p| p.id == new.id) {
                return Err(StoreError::Unavailable(format!(
                    "duplicate profile {}",
                    new.id
                )));
            }
            if email_taken(profiles, new.id, &new.email) {
                return Err(StoreError::EmailTaken);
            }
            let now = Utc::now();
            let profile = Profile {
                id: new.id,
                email: new.email,
                full_name: new.full_name,
                avatar_url: new.avatar_url,
                role: new.role,
                is_active: true,
                created_at: now,
                last_login_at: Some(now),
            };
            profiles.push(profile.clone());
            Ok(profile)
        })
    }

    async fn record_login(&self, id: UserId, details: &LoginDetails) -> Result<Profile, StoreError> {
        if self.with_profiles(|profiles| email_taken(profiles, id, &details.email)) {
            return Err(StoreError::EmailTaken);
        }
        self.update(id, |profile| {
            profile.email = details.email.clone();
            profile.full_name.clone_from(&details.full_name);
            profile.avatar_url.clone_from(&details.avatar_url);
            profile.last_login_at = Some(Utc::now());
        })
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<Profile, StoreError> {
        self.update(id, |profile| profile.role = role)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        Ok(self.with_profiles(|profiles| profiles.clone()))
    }
}
