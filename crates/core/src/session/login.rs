use tracing::info;

use super::identity::{Identity, LoginDetails, NewProfile, Profile};
use super::ports::{ProfileStore, StoreError};
use crate::types::Role;

/// Role for a brand-new profile: the first one becomes the admin, everyone
/// after that starts as an editor.
#[must_use]
pub const fn initial_role(existing_admins: u64) -> Role {
    if existing_admins == 0 {
        Role::Admin
    } else {
        Role::Editor
    }
}

/// Create or refresh the profile for a freshly authenticated identity.
///
/// Existing profiles get email, name and avatar refreshed and keep their
/// role. New profiles get [`initial_role`].
///
/// Two simultaneous first logins can both observe zero admins; the store's
/// primary key only prevents duplicate rows for the same identity.
///
/// # Errors
///
/// Propagates [`StoreError`] from the profile store, including
/// [`StoreError::EmailTaken`] when the provider's email is already on
/// another profile.
pub async fn record_login<P: ProfileStore>(
    store: &P,
    identity: &Identity,
) -> Result<Profile, StoreError> {
    if store.get_profile(identity.id).await?.is_some() {
        return store
            .record_login(identity.id, &LoginDetails::from(identity))
            .await;
    }

    let role = initial_role(store.count_with_role(Role::Admin).await?);
    info!(user_id = %identity.id, role = %role, "Creating profile on first login");

    store
        .insert_profile(NewProfile {
            id: identity.id,
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            role,
        })
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::memory::MemoryProfileStore;
    use crate::types::{Email, UserId};

    fn identity(sub: &str, email: &str) -> Identity {
        Identity {
            id: UserId::from_subject("https://id.test", sub),
            email: Email::parse(email).unwrap(),
            full_name: None,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_first_profile_becomes_admin_then_editors() {
        let store = MemoryProfileStore::default();

        let first = record_login(&store, &identity("a", "a@shop.test")).await.unwrap();
        let second = record_login(&store, &identity("b", "b@shop.test")).await.unwrap();

        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::Editor);
    }

    #[tokio::test]
    async fn test_returning_login_refreshes_details_but_keeps_role() {
        let store = MemoryProfileStore::default();
        let mut user = identity("a", "a@shop.test");
        record_login(&store, &user).await.unwrap();
        store.set_role(user.id, Role::SeoManager).await.unwrap();

        user.email = Email::parse("new@shop.test").unwrap();
        user.full_name = Some("Ada".into());
        let refreshed = record_login(&store, &user).await.unwrap();

        assert_eq!(refreshed.role, Role::SeoManager);
        assert_eq!(refreshed.email.as_str(), "new@shop.test");
        assert_eq!(refreshed.full_name.as_deref(), Some("Ada"));
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_identity_with_taken_email_is_refused() {
        let store = MemoryProfileStore::default();
        record_login(&store, &identity("a", "shared@shop.test")).await.unwrap();

        let err = record_login(&store, &identity("b", "Shared@Shop.test"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::EmailTaken));
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_returning_login_with_email_of_another_profile_is_refused() {
        let store = MemoryProfileStore::default();
        record_login(&store, &identity("a", "a@shop.test")).await.unwrap();
        let mut user = identity("b", "b@shop.test");
        record_login(&store, &user).await.unwrap();

        user.email = Email::parse("a@shop.test").unwrap();
        let err = record_login(&store, &user).await.unwrap_err();

        assert!(matches!(err, StoreError::EmailTaken));
        let profile = store.get_profile(user.id).await.unwrap().unwrap();
        assert_eq!(profile.email.as_str(), "b@shop.test");
    }

    #[test]
    fn test_initial_role() {
        assert_eq!(initial_role(0), Role::Admin);
        assert_eq!(initial_role(3), Role::Editor);
    }
}
