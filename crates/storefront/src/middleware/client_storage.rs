//! Client storage backed by the visitor's session.
//!
//! The cart and favourites stores in `handset-core` persist through the
//! [`ClientStorage`] port. Here that port writes JSON text into the
//! tower-sessions record under a `client:` prefix, so it shares the session
//! cookie and expiry with sign-in.

use tower_sessions::Session;
use tracing::warn;

use handset_core::cart::{CartStore, ClientStorage, FavouritesStore};

use crate::db::PgCatalog;
use crate::models::session_keys::CLIENT_STORAGE_PREFIX;
use crate::state::AppState;

/// [`ClientStorage`] over a tower-sessions [`Session`].
///
/// Session backend failures are logged and otherwise ignored: reads return
/// `None`, writes are dropped.
#[derive(Clone, Debug)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    fn key(key: &str) -> String {
        format!("{CLIENT_STORAGE_PREFIX}{key}")
    }
}

impl ClientStorage for SessionStorage {
    async fn get(&self, key: &str) -> Option<String> {
        self.session
            .get::<String>(&Self::key(key))
            .await
            .unwrap_or_else(|e| {
                warn!(key, error = %e, "Session read failed");
                None
            })
    }

    async fn set(&self, key: &str, value: String) {
        if let Err(e) = self.session.insert(&Self::key(key), value).await {
            warn!(key, error = %e, "Session write failed");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.session.remove_value(&Self::key(key)).await {
            warn!(key, error = %e, "Session delete failed");
        }
    }
}

pub type SessionCart = CartStore<SessionStorage, PgCatalog>;
pub type SessionFavourites = FavouritesStore<SessionStorage>;

/// The visitor's cart, reconciling against the published catalog.
#[must_use]
pub fn cart_for(session: &Session, state: &AppState) -> SessionCart {
    CartStore::new(
        SessionStorage::new(session.clone()),
        state.catalog(),
        state.config().catalog_timeout,
    )
}

#[must_use]
pub fn favourites_for(session: &Session) -> SessionFavourites {
    FavouritesStore::new(SessionStorage::new(session.clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_values_are_prefixed_in_the_session() {
        let session = session();
        let storage = SessionStorage::new(session.clone());

        storage.set("cart:v3", "[]".to_owned()).await;
        assert_eq!(storage.get("cart:v3").await.as_deref(), Some("[]"));
        assert_eq!(
            session.get::<String>("client:cart:v3").await.unwrap().as_deref(),
            Some("[]")
        );

        storage.remove("cart:v3").await;
        assert!(storage.get("cart:v3").await.is_none());
    }

    #[tokio::test]
    async fn test_favourites_round_trip_through_session() {
        let session = session();
        let favourites = favourites_for(&session);
        let id = handset_core::ProductId::new(9);

        assert!(favourites.toggle(id).await);
        let reloaded = favourites_for(&session);
        assert_eq!(reloaded.load().await, vec![id]);
    }
}
