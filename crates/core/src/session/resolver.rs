use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::warn;

use super::access::{Access, Denial};
use super::identity::{Identity, Profile};
use super::permissions::{Permission, PermissionTable};
use super::ports::{IdentityProvider, ProfileStore};
use crate::types::Role;

/// Per-request view of who is signing in and what they may do.
///
/// Identity and profile are each resolved at most once; later calls return
/// the cached value. Build a fresh resolver for every request.
pub struct SessionResolver<I, P> {
    identities: I,
    profiles: P,
    permissions: Arc<PermissionTable>,
    identity: OnceCell<Option<Identity>>,
    profile: OnceCell<Option<Profile>>,
}

impl<I, P> SessionResolver<I, P>
where
    I: IdentityProvider,
    P: ProfileStore,
{
    pub fn new(identities: I, profiles: P, permissions: Arc<PermissionTable>) -> Self {
        Self {
            identities,
            profiles,
            permissions,
            identity: OnceCell::new(),
            profile: OnceCell::new(),
        }
    }

    /// The signed-in identity, resolved once per request.
    pub async fn current_user(&self) -> Option<&Identity> {
        self.identity
            .get_or_init(|| self.identities.current_identity())
            .await
            .as_ref()
    }

    /// The signed-in user's profile.
    ///
    /// `None` when nobody is signed in, no profile row exists, or the store
    /// fails. Store failures are logged, never propagated.
    pub async fn current_profile(&self) -> Option<&Profile> {
        self.profile
            .get_or_init(|| async {
                let identity = self.current_user().await?;
                match self.profiles.get_profile(identity.id).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!(user_id = %identity.id, error = %e, "Failed to load profile");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    pub async fn require_auth(&self) -> Access<Identity> {
        self.current_user().await.cloned().into()
    }

    /// Grant the profile when its role is one of `allowed`.
    pub async fn require_role(&self, allowed: &[Role]) -> Access<Profile> {
        match self.current_profile().await {
            None => Access::Denied(Denial::Unauthenticated),
            Some(profile) if allowed.contains(&profile.role) => Access::Granted(profile.clone()),
            Some(_) => Access::Denied(Denial::Forbidden),
        }
    }

    pub async fn require_permission(&self, permission: Permission) -> Access<Profile> {
        match self.current_profile().await {
            None => Access::Denied(Denial::Unauthenticated),
            Some(profile) if self.permissions.allows(profile.role, permission) => {
                Access::Granted(profile.clone())
            }
            Some(_) => Access::Denied(Denial::Forbidden),
        }
    }

    pub async fn has_permission(&self, permission: Permission) -> bool {
        self.current_profile()
            .await
            .is_some_and(|profile| self.permissions.allows(profile.role, permission))
    }

    /// Everything the current user may do, for rendering navigation.
    pub async fn permissions(&self) -> Vec<Permission> {
        match self.current_profile().await {
            Some(profile) => self.permissions.permissions_for(profile.role),
            None => Vec::new(),
        }
    }

    /// Drop the credential. The cached identity stays valid for this request.
    pub async fn sign_out(&self) {
        self.identities.sign_out().await;
    }

    pub const fn profiles(&self) -> &P {
        &self.profiles
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::session::memory::{MemoryProfileStore, StaticIdentity};
    use crate::session::{NewProfile, StoreError};
    use crate::types::{Email, UserId};

    fn identity(sub: &str) -> Identity {
        Identity {
            id: UserId::from_subject("https://id.test", sub),
            email: Email::parse(&format!("{sub}@shop.test")).unwrap(),
            full_name: Some(sub.to_owned()),
            avatar_url: None,
        }
    }

    async fn store_with(identity: &Identity, role: Role) -> MemoryProfileStore {
        let store = MemoryProfileStore::default();
        store
            .insert_profile(NewProfile {
                id: identity.id,
                email: identity.email.clone(),
                full_name: identity.full_name.clone(),
                avatar_url: None,
                role,
            })
            .await
            .unwrap();
        store
    }

    fn resolver<P: ProfileStore>(
        identity: Option<Identity>,
        profiles: P,
    ) -> SessionResolver<StaticIdentity, P> {
        SessionResolver::new(
            StaticIdentity::new(identity),
            profiles,
            Arc::new(PermissionTable::standard()),
        )
    }

    struct CountingIdentity {
        calls: AtomicUsize,
        identity: Identity,
    }

    impl IdentityProvider for CountingIdentity {
        async fn current_identity(&self) -> Option<Identity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(self.identity.clone())
        }

        async fn sign_out(&self) {}
    }

    struct FailingStore;

    impl ProfileStore for FailingStore {
        async fn get_profile(&self, _id: UserId) -> Result<Option<Profile>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn count_with_role(&self, _role: Role) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn insert_profile(&self, _profile: NewProfile) -> Result<Profile, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn record_login(
            &self,
            _id: UserId,
            _details: &crate::session::LoginDetails,
        ) -> Result<Profile, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set_role(&self, _id: UserId, _role: Role) -> Result<Profile, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_anonymous_visitor_is_sent_to_login() {
        let resolver = resolver(None, MemoryProfileStore::default());

        assert!(resolver.current_user().await.is_none());
        assert_eq!(
            resolver.require_auth().await,
            Access::Denied(Denial::Unauthenticated)
        );
        let denied = resolver.require_role(Role::STAFF).await.into_result().unwrap_err();
        assert_eq!(denied.redirect_to(), "/auth/login");
    }

    #[tokio::test]
    async fn test_customer_is_forbidden_from_staff_pages() {
        let user = identity("carol");
        let store = store_with(&user, Role::Customer).await;
        let resolver = resolver(Some(user.clone()), store);

        assert_eq!(resolver.require_auth().await, Access::Granted(user));
        let denied = resolver.require_role(Role::STAFF).await.into_result().unwrap_err();
        assert_eq!(denied, Denial::Forbidden);
        assert_eq!(denied.redirect_to(), "/unauthorized");
    }

    #[tokio::test]
    async fn test_editor_is_granted_staff_role_with_profile() {
        let user = identity("eddie");
        let store = store_with(&user, Role::Editor).await;
        let resolver = resolver(Some(user.clone()), store);

        let profile = resolver.require_role(Role::STAFF).await.into_result().unwrap();
        assert_eq!(profile.id, user.id);
        assert_eq!(profile.role, Role::Editor);
        assert_eq!(
            resolver.require_role(&[Role::Admin]).await,
            Access::Denied(Denial::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_identity_without_profile_is_unauthenticated_for_roles() {
        let resolver = resolver(Some(identity("ghost")), MemoryProfileStore::default());

        assert!(resolver.require_auth().await.is_granted());
        assert_eq!(
            resolver.require_role(Role::STAFF).await,
            Access::Denied(Denial::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_store_failure_fails_soft() {
        let resolver = resolver(Some(identity("dora")), FailingStore);

        assert!(resolver.current_profile().await.is_none());
        assert!(!resolver.has_permission(Permission::DashboardView).await);
        assert!(resolver.permissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_identity_is_resolved_once_per_request() {
        let provider = CountingIdentity {
            calls: AtomicUsize::new(0),
            identity: identity("memo"),
        };
        let resolver = SessionResolver::new(
            provider,
            MemoryProfileStore::default(),
            Arc::new(PermissionTable::standard()),
        );

        let first = resolver.current_user().await.unwrap();
        let second = resolver.current_user().await.unwrap();
        assert!(std::ptr::eq(first, second));
        let _ = resolver.current_profile().await;
        let _ = resolver.require_auth().await;

        assert_eq!(resolver.identities.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_has_permission_follows_role_table() {
        let user = identity("sam");
        let store = store_with(&user, Role::SeoManager).await;
        let resolver = resolver(Some(user), store);

        assert!(resolver.has_permission(Permission::SeoWrite).await);
        assert!(!resolver.has_permission(Permission::OrdersRead).await);
        assert!(resolver.require_permission(Permission::SeoRead).await.is_granted());
        assert_eq!(
            resolver.require_permission(Permission::UsersManage).await,
            Access::Denied(Denial::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_sign_out_clears_the_credential() {
        let provider = StaticIdentity::new(Some(identity("leaver")));
        let resolver = SessionResolver::new(
            provider.clone(),
            MemoryProfileStore::default(),
            Arc::new(PermissionTable::standard()),
        );

        resolver.sign_out().await;
        assert!(provider.current_identity().await.is_none());
    }
}
