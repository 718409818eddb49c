use std::future::Future;

use super::line_item::CatalogProduct;
use crate::types::ProductId;

/// Failure of the catalog lookup. The cart treats every variant the same way:
/// keep the items it already has.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog returned invalid data: {0}")]
    InvalidData(String),
}

/// Key/value storage scoped to one visitor.
///
/// Calls never fail from the caller's point of view: an unavailable backend
/// reads as empty and drops writes.
pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Option<String>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = ()> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = ()> + Send;
}

/// Read access to published products.
pub trait Catalog: Send + Sync {
    /// One batched lookup. Unknown or unpublished ids are simply absent from
    /// the result; order is unspecified.
    fn published_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<CatalogProduct>, CatalogError>> + Send;
}
