use tokio::sync::Mutex;
use tracing::warn;

use super::keys;
use super::ports::ClientStorage;
use crate::types::ProductId;

/// A visitor's favourite products: unique ids in the order they were added.
///
/// Loaded lazily on first use and written back after every change.
pub struct FavouritesStore<S> {
    storage: S,
    ids: Mutex<Option<Vec<ProductId>>>,
}

impl<S: ClientStorage> FavouritesStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            ids: Mutex::new(None),
        }
    }

    /// Read the persisted set and purge legacy keys. Unreadable data reads as empty.
    pub async fn load(&self) -> Vec<ProductId> {
        for key in keys::LEGACY_FAVOURITES {
            self.storage.remove(key).await;
        }
        let Some(raw) = self.storage.get(keys::FAVOURITES).await else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ProductId>>(&raw) {
            Ok(ids) => {
                let mut unique = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(&id) {
                        unique.push(id);
                    }
                }
                unique
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable favourites");
                Vec::new()
            }
        }
    }

    pub async fn ids(&self) -> Vec<ProductId> {
        self.with_ids(|ids| (ids.clone(), false)).await
    }

    pub async fn contains(&self, id: ProductId) -> bool {
        self.with_ids(|ids| (ids.contains(&id), false)).await
    }

    /// Returns `true` if the id was not already a favourite.
    pub async fn add(&self, id: ProductId) -> bool {
        self.with_ids(|ids| {
            if ids.contains(&id) {
                (false, false)
            } else {
                ids.push(id);
                (true, true)
            }
        })
        .await
    }

    /// Returns `true` if the id was a favourite.
    pub async fn remove(&self, id: ProductId) -> bool {
        self.with_ids(|ids| {
            let before = ids.len();
            ids.retain(|existing| *existing != id);
            let removed = ids.len() != before;
            (removed, removed)
        })
        .await
    }

    /// Flip membership; returns whether `id` is a favourite afterwards.
    pub async fn toggle(&self, id: ProductId) -> bool {
        self.with_ids(|ids| {
            if let Some(pos) = ids.iter().position(|existing| *existing == id) {
                ids.remove(pos);
                (false, true)
            } else {
                ids.push(id);
                (true, true)
            }
        })
        .await
    }

    pub async fn clear(&self) {
        *self.ids.lock().await = Some(Vec::new());
        self.storage.remove(keys::FAVOURITES).await;
    }

    /// Run `f` over the loaded ids; persist when it reports a change.
    async fn with_ids<T>(&self, f: impl FnOnce(&mut Vec<ProductId>) -> (T, bool) + Send) -> T {
        let mut guard = self.ids.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        let ids = guard.get_or_insert_with(Vec::new);
        let (result, changed) = f(ids);
        if changed {
            match serde_json::to_string(ids) {
                Ok(json) => self.storage.set(keys::FAVOURITES, json).await,
                Err(e) => warn!(error = %e, "Failed to encode favourites"),
            }
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::memory::MemoryStorage;

    fn id(n: i32) -> ProductId {
        ProductId::new(n)
    }

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let store = FavouritesStore::new(MemoryStorage::default());

        assert!(store.toggle(id(1)).await);
        assert!(store.contains(id(1)).await);
        assert!(!store.toggle(id(1)).await);
        assert!(store.ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_ids_stay_unique_in_insertion_order() {
        let storage = MemoryStorage::default();
        let store = FavouritesStore::new(storage.clone());

        assert!(store.add(id(3)).await);
        assert!(store.add(id(1)).await);
        assert!(!store.add(id(3)).await);
        assert!(store.add(id(2)).await);

        assert_eq!(store.ids().await, vec![id(3), id(1), id(2)]);
        let reopened = FavouritesStore::new(storage);
        assert_eq!(reopened.ids().await, vec![id(3), id(1), id(2)]);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let storage = MemoryStorage::default();
        let store = FavouritesStore::new(storage.clone());
        store.add(id(1)).await;
        store.add(id(2)).await;

        assert!(store.remove(id(1)).await);
        assert!(!store.remove(id(1)).await);
        store.clear().await;

        assert!(store.ids().await.is_empty());
        assert!(storage.get(keys::FAVOURITES).await.is_none());
    }

    #[tokio::test]
    async fn test_load_tolerates_garbage_and_duplicates() {
        let storage = MemoryStorage::default();
        storage.set(keys::FAVOURITES, "[4,4,5]".to_owned()).await;
        storage.set("favourites", "[9]".to_owned()).await;
        let store = FavouritesStore::new(storage.clone());

        assert_eq!(store.load().await, vec![id(4), id(5)]);
        assert!(storage.get("favourites").await.is_none());

        storage.set(keys::FAVOURITES, "oops".to_owned()).await;
        assert!(store.load().await.is_empty());
    }
}
