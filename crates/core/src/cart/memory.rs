//! In-memory adapters for the cart ports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::line_item::CatalogProduct;
use super::ports::{Catalog, CatalogError, ClientStorage};
use crate::types::ProductId;

/// Map-backed storage. Clones share the same map.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
    available: bool,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            values: Arc::default(),
            available: true,
        }
    }
}

impl MemoryStorage {
    /// Storage whose backend is gone: reads are empty, writes vanish.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClientStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Option<String> {
        if !self.available {
            return None;
        }
        self.values().get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        if self.available {
            self.values().insert(key.to_owned(), value);
        }
    }

    async fn remove(&self, key: &str) {
        if self.available {
            self.values().remove(key);
        }
    }
}

/// A fixed set of published products.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    products: Vec<CatalogProduct>,
    failing: bool,
}

impl MemoryCatalog {
    #[must_use]
    pub const fn with(products: Vec<CatalogProduct>) -> Self {
        Self {
            products,
            failing: false,
        }
    }

    /// A catalog whose every lookup errors.
    #[must_use]
    pub const fn failing() -> Self {
        Self {
            products: Vec::new(),
            failing: true,
        }
    }
}

impl Catalog for MemoryCatalog {
    async fn published_products(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        if self.failing {
            return Err(CatalogError::Unavailable("catalog offline".into()));
        }
        Ok(self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}
