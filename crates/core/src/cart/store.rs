use std::collections::HashSet;
use std::num::NonZeroU32;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::keys;
use super::line_item::{self, LineItem, reconcile_items};
use super::ports::{Catalog, ClientStorage};
use crate::types::ProductId;

#[derive(Debug, Default)]
struct CartState {
    items: Vec<LineItem>,
    reconciled: bool,
}

/// A visitor's cart.
///
/// All reads and writes go through one async mutex, so hydration is single
/// flight and storage writes never interleave. A mutation on a cart that has
/// not been hydrated yet is applied to the stored lines before they are
/// reconciled, so it counts against what the visitor already had and cannot
/// smuggle in an unpublished product.
pub struct CartStore<S, C> {
    storage: S,
    catalog: C,
    lookup_timeout: Duration,
    state: Mutex<CartState>,
}

impl<S, C> CartStore<S, C>
where
    S: ClientStorage,
    C: Catalog,
{
    pub fn new(storage: S, catalog: C, lookup_timeout: Duration) -> Self {
        Self {
            storage,
            catalog,
            lookup_timeout,
            state: Mutex::new(CartState::default()),
        }
    }

    /// Read the persisted cart and purge legacy keys.
    ///
    /// Anything that does not decode as the current layout reads as empty.
    pub async fn load(&self) -> Vec<LineItem> {
        for key in keys::LEGACY_CART {
            self.storage.remove(key).await;
        }

        let Some(raw) = self.storage.get(keys::CART).await else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<LineItem>>(&raw) {
            Ok(items) => dedupe(items),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cart");
                Vec::new()
            }
        }
    }

    /// Write `items` under the current key.
    pub async fn persist(&self, items: &[LineItem]) {
        match serde_json::to_string(items) {
            Ok(json) => self.storage.set(keys::CART, json).await,
            Err(e) => warn!(error = %e, "Failed to encode cart"),
        }
    }

    /// Re-synchronize `items` with the published catalog.
    ///
    /// Fails open: when the lookup errors or exceeds the timeout, `items`
    /// come back unchanged.
    pub async fn reconcile(&self, items: Vec<LineItem>) -> Vec<LineItem> {
        if items.is_empty() {
            return items;
        }
        let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();

        match tokio::time::timeout(self.lookup_timeout, self.catalog.published_products(&ids))
            .await
        {
            Ok(Ok(products)) => {
                let reconciled = reconcile_items(items, &products);
                debug!(
                    requested = ids.len(),
                    kept = reconciled.len(),
                    "Cart reconciled"
                );
                reconciled
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Catalog lookup failed, keeping cart as is");
                items
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.lookup_timeout.as_millis(),
                    "Catalog lookup timed out, keeping cart as is"
                );
                items
            }
        }
    }

    /// Load, reconcile and persist the cart once.
    ///
    /// Concurrent callers wait for the first; later calls return the settled
    /// items without touching storage or the catalog again.
    pub async fn hydrate(&self) -> Vec<LineItem> {
        let mut state = self.state.lock().await;
        if !state.reconciled {
            self.settle(&mut state, |_| {}).await;
            self.persist(&state.items).await;
        }
        state.items.clone()
    }

    /// Load the stored lines, apply `edit`, then reconcile into `state`.
    async fn settle(&self, state: &mut CartState, edit: impl FnOnce(&mut Vec<LineItem>) + Send) {
        let mut items = self.load().await;
        edit(&mut items);
        state.items = self.reconcile(items).await;
        state.reconciled = true;
    }

    pub async fn is_reconciled(&self) -> bool {
        self.state.lock().await.reconciled
    }

    /// Current in-memory items.
    pub async fn items(&self) -> Vec<LineItem> {
        self.state.lock().await.items.clone()
    }

    /// Add one unit. An existing line gains a unit; a new one starts at one.
    pub async fn add_item(&self, item: LineItem) {
        self.mutate(|items| {
            if let Some(existing) = items.iter_mut().find(|i| i.product_id == item.product_id) {
                existing.quantity = existing.quantity.saturating_add(1);
            } else {
                items.push(LineItem {
                    quantity: NonZeroU32::MIN,
                    ..item
                });
            }
        })
        .await;
    }

    /// Set a line's quantity. Zero or less removes it; unknown ids are ignored.
    pub async fn update_quantity(&self, product_id: ProductId, quantity: i64) {
        self.mutate(|items| {
            let quantity = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
            match NonZeroU32::new(quantity) {
                None => items.retain(|i| i.product_id != product_id),
                Some(quantity) => {
                    if let Some(item) = items.iter_mut().find(|i| i.product_id == product_id) {
                        item.quantity = quantity;
                    }
                }
            }
        })
        .await;
    }

    pub async fn remove_item(&self, product_id: ProductId) {
        self.mutate(|items| items.retain(|i| i.product_id != product_id)).await;
    }

    /// Empty the cart and erase it from storage.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.items.clear();
        state.reconciled = true;
        self.storage.remove(keys::CART).await;
    }

    pub async fn total(&self) -> Decimal {
        line_item::total(&self.state.lock().await.items)
    }

    pub async fn count(&self) -> u64 {
        line_item::count(&self.state.lock().await.items)
    }

    async fn mutate(&self, f: impl FnOnce(&mut Vec<LineItem>) + Send) {
        let mut state = self.state.lock().await;
        if state.reconciled {
            f(&mut state.items);
        } else {
            self.settle(&mut state, f).await;
        }
        self.persist(&state.items).await;
    }
}

/// Keep the first line for each product id.
fn dedupe(items: Vec<LineItem>) -> Vec<LineItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.product_id))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cart::memory::{MemoryCatalog, MemoryStorage};
    use crate::cart::{CatalogError, CatalogProduct};

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn product(id: i32, price: i64) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            title: format!("Phone {id}"),
            slug: format!("phone-{id}"),
            price: Decimal::new(price, 0),
            compare_at_price: None,
            on_sale: false,
            featured_image: None,
        }
    }

    fn line(id: i32, price: i64, quantity: u32) -> LineItem {
        LineItem {
            quantity: NonZeroU32::new(quantity).unwrap(),
            ..LineItem::from_product(&product(id, price))
        }
    }

    fn store(
        storage: MemoryStorage,
        catalog: MemoryCatalog,
    ) -> CartStore<MemoryStorage, MemoryCatalog> {
        CartStore::new(storage, catalog, TIMEOUT)
    }

    async fn seeded(items: &[LineItem]) -> MemoryStorage {
        let storage = MemoryStorage::default();
        storage
            .set(keys::CART, serde_json::to_string(items).unwrap())
            .await;
        storage
    }

    struct PendingCatalog;

    impl Catalog for PendingCatalog {
        async fn published_products(
            &self,
            _ids: &[ProductId],
        ) -> Result<Vec<CatalogProduct>, CatalogError> {
            std::future::pending().await
        }
    }

    struct CountingCatalog {
        inner: MemoryCatalog,
        calls: Arc<AtomicUsize>,
    }

    impl Catalog for CountingCatalog {
        async fn published_products(
            &self,
            ids: &[ProductId],
        ) -> Result<Vec<CatalogProduct>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.published_products(ids).await
        }
    }

    #[tokio::test]
    async fn test_add_then_increment() {
        let cart = store(MemoryStorage::default(), MemoryCatalog::default());
        cart.hydrate().await;

        let item = LineItem::from_product(&product(42, 100));
        cart.add_item(item.clone()).await;
        assert_eq!(cart.items().await, vec![line(42, 100, 1)]);

        cart.add_item(item).await;
        let items = cart.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity.get(), 2);
        assert_eq!(cart.count().await, 2);
        assert_eq!(cart.total().await, Decimal::new(200, 0));
    }

    #[tokio::test]
    async fn test_add_ignores_supplied_quantity_for_new_lines() {
        let cart = store(MemoryStorage::default(), MemoryCatalog::default());
        cart.hydrate().await;
        cart.add_item(line(1, 10, 9)).await;
        assert_eq!(cart.count().await, 1);
    }

    #[tokio::test]
    async fn test_reconcile_drops_unpublished_products() {
        let storage = seeded(&[line(1, 10, 1), line(2, 20, 3)]).await;
        let cart = store(storage.clone(), MemoryCatalog::with(vec![product(2, 20)]));

        let items = cart.hydrate().await;

        assert_eq!(items, vec![line(2, 20, 3)]);
        assert_eq!(cart.total().await, Decimal::new(60, 0));
        let stored: Vec<LineItem> =
            serde_json::from_str(&storage.get(keys::CART).await.unwrap()).unwrap();
        assert_eq!(stored, items);
    }

    #[tokio::test]
    async fn test_reconcile_applies_sale_price_and_keeps_quantity() {
        let storage = seeded(&[line(7, 100, 2)]).await;
        let mut on_sale = product(7, 80);
        on_sale.title = "Phone 7 (renamed)".into();
        on_sale.compare_at_price = Some(Decimal::new(100, 0));
        on_sale.on_sale = true;
        let cart = store(storage, MemoryCatalog::with(vec![on_sale]));

        let items = cart.hydrate().await;

        assert_eq!(items[0].title, "Phone 7 (renamed)");
        assert_eq!(items[0].unit_price, Decimal::new(100, 0));
        assert_eq!(items[0].sale_price, Some(Decimal::new(80, 0)));
        assert_eq!(items[0].quantity.get(), 2);
        assert_eq!(cart.total().await, Decimal::new(160, 0));
    }

    #[tokio::test]
    async fn test_update_quantity_to_zero_or_less_removes() {
        let storage = seeded(&[line(5, 10, 3), line(6, 10, 1)]).await;
        let cart = store(
            storage,
            MemoryCatalog::with(vec![product(5, 10), product(6, 10)]),
        );
        cart.hydrate().await;

        cart.update_quantity(ProductId::new(5), 0).await;
        cart.update_quantity(ProductId::new(6), -4).await;

        assert!(cart.items().await.is_empty());
        assert_eq!(cart.count().await, 0);
    }

    #[tokio::test]
    async fn test_update_quantity_sets_and_ignores_unknown() {
        let cart = store(MemoryStorage::default(), MemoryCatalog::default());
        cart.hydrate().await;
        cart.add_item(line(1, 10, 1)).await;

        cart.update_quantity(ProductId::new(1), 4).await;
        cart.update_quantity(ProductId::new(99), 4).await;

        assert_eq!(cart.items().await, vec![line(1, 10, 4)]);
    }

    #[tokio::test]
    async fn test_reconcile_refreshes_price_keeps_quantity() {
        let storage = seeded(&[line(1, 100, 2)]).await;
        let cart = store(storage, MemoryCatalog::with(vec![product(1, 120)]));

        let items = cart.hydrate().await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, Decimal::new(120, 0));
        assert_eq!(items[0].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_deleted_product_empties_cart() {
        let storage = seeded(&[line(2, 50, 1)]).await;
        let cart = store(storage, MemoryCatalog::default());

        assert!(cart.hydrate().await.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_keeps_cart() {
        let original = vec![line(1, 10, 1), line(2, 20, 2), line(3, 5, 4)];
        let storage = seeded(&original).await;
        let cart = store(storage, MemoryCatalog::failing());

        assert_eq!(cart.hydrate().await, original);
        assert!(cart.is_reconciled().await);
    }

    #[tokio::test]
    async fn test_catalog_timeout_keeps_cart() {
        let original = vec![line(3, 30, 1)];
        let storage = seeded(&original).await;
        let cart = CartStore::new(storage, PendingCatalog, Duration::from_millis(20));

        assert_eq!(cart.hydrate().await, original);
    }

    #[tokio::test]
    async fn test_corrupted_storage_reads_as_empty() {
        let storage = MemoryStorage::default();
        storage.set(keys::CART, "{not json".to_owned()).await;
        let cart = store(storage, MemoryCatalog::default());

        assert!(cart.load().await.is_empty());
        assert_eq!(cart.count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_in_storage_is_rejected() {
        let storage = MemoryStorage::default();
        storage
            .set(
                keys::CART,
                r#"[{"product_id":1,"title":"x","slug":"x","unit_price":"1","sale_price":null,"image":null,"quantity":0}]"#
                    .to_owned(),
            )
            .await;
        let cart = store(storage, MemoryCatalog::default());

        assert!(cart.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_purges_legacy_keys() {
        let storage = MemoryStorage::default();
        for key in keys::LEGACY_CART {
            storage.set(key, "[]".to_owned()).await;
        }
        let cart = store(storage.clone(), MemoryCatalog::default());

        cart.load().await;

        for key in keys::LEGACY_CART {
            assert!(storage.get(key).await.is_none(), "{key} survived");
        }
    }

    #[tokio::test]
    async fn test_persist_load_round_trip() {
        let cart = store(MemoryStorage::default(), MemoryCatalog::default());
        let items = vec![line(1, 10, 2), line(2, 15, 1)];

        cart.persist(&items).await;

        assert_eq!(cart.load().await, items);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let catalog = MemoryCatalog::with(vec![product(1, 11), product(3, 33)]);
        let cart = store(MemoryStorage::default(), catalog);
        let items = vec![line(1, 10, 2), line(2, 20, 1), line(3, 30, 1)];

        let once = cart.reconcile(items).await;
        let twice = cart.reconcile(once.clone()).await;

        assert_eq!(once, twice);
        assert!(once.iter().all(|i| [1, 3].contains(&i.product_id.get())));
    }

    #[tokio::test]
    async fn test_total_ignores_order() {
        let a = vec![line(1, 10, 2), line(2, 7, 3), line(3, 100, 1)];
        let mut b = a.clone();
        b.reverse();

        assert_eq!(line_item::total(&a), line_item::total(&b));
        assert_eq!(line_item::total(&a), Decimal::new(141, 0));
    }

    #[tokio::test]
    async fn test_unavailable_storage_keeps_memory_cart() {
        let cart = store(MemoryStorage::unavailable(), MemoryCatalog::default());
        cart.hydrate().await;

        cart.add_item(line(1, 10, 1)).await;
        cart.add_item(line(1, 10, 1)).await;

        assert_eq!(cart.count().await, 2);
        assert!(cart.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_before_hydrate_increments_stored_line() {
        let storage = seeded(&[line(1, 10, 3)]).await;
        let cart = store(storage.clone(), MemoryCatalog::with(vec![product(1, 10)]));

        cart.add_item(line(1, 10, 1)).await;

        assert_eq!(cart.count().await, 4);
        assert_eq!(cart.hydrate().await, vec![line(1, 10, 4)]);
        assert_eq!(cart.load().await, vec![line(1, 10, 4)]);
    }

    #[tokio::test]
    async fn test_unpublished_add_before_hydrate_is_dropped() {
        let storage = seeded(&[line(1, 10, 1)]).await;
        let cart = store(storage.clone(), MemoryCatalog::with(vec![product(1, 10)]));

        cart.add_item(line(9, 90, 1)).await;

        assert_eq!(cart.hydrate().await, vec![line(1, 10, 1)]);
        assert_eq!(cart.load().await, vec![line(1, 10, 1)]);
    }

    #[tokio::test]
    async fn test_remove_before_hydrate_applies_to_stored_lines() {
        let storage = seeded(&[line(1, 10, 2), line(2, 20, 1)]).await;
        let cart = store(
            storage,
            MemoryCatalog::with(vec![product(1, 10), product(2, 20)]),
        );

        cart.update_quantity(ProductId::new(1), 0).await;

        assert!(cart.is_reconciled().await);
        assert_eq!(cart.hydrate().await, vec![line(2, 20, 1)]);
        assert_eq!(cart.load().await, vec![line(2, 20, 1)]);
    }

    #[tokio::test]
    async fn test_two_stores_over_one_storage_see_each_others_writes() {
        let storage = seeded(&[line(1, 10, 1)]).await;
        let catalog = MemoryCatalog::with(vec![product(1, 10)]);
        let first = store(storage.clone(), catalog.clone());
        first.add_item(line(1, 10, 1)).await;

        let second = store(storage.clone(), catalog);
        second.add_item(line(1, 10, 1)).await;

        assert_eq!(second.count().await, 3);
        assert_eq!(line_item::count(&second.load().await), 3);
    }

    #[tokio::test]
    async fn test_concurrent_hydrate_is_single_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let storage = seeded(&[line(1, 10, 1)]).await;
        let cart = Arc::new(CartStore::new(
            storage,
            CountingCatalog {
                inner: MemoryCatalog::with(vec![product(1, 10)]),
                calls: Arc::clone(&calls),
            },
            TIMEOUT,
        ));

        let (a, b) = tokio::join!(cart.hydrate(), cart.hydrate());

        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_erases_storage() {
        let storage = seeded(&[line(1, 10, 1)]).await;
        let cart = store(storage.clone(), MemoryCatalog::with(vec![product(1, 10)]));
        cart.hydrate().await;

        cart.clear().await;

        assert!(cart.items().await.is_empty());
        assert!(storage.get(keys::CART).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let cart = store(MemoryStorage::default(), MemoryCatalog::default());
        cart.hydrate().await;
        cart.add_item(line(1, 10, 1)).await;
        cart.add_item(line(2, 10, 1)).await;

        cart.remove_item(ProductId::new(1)).await;
        cart.remove_item(ProductId::new(77)).await;

        assert_eq!(cart.items().await, vec![line(2, 10, 1)]);
    }
}
