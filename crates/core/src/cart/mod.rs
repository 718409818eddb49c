//! Client-persisted cart and favourites.
//!
//! Both stores keep their state in the visitor's [`ClientStorage`] as JSON
//! under a versioned key. Bumping the version abandons old data instead of
//! failing to decode it; the previous keys are purged on load.
//!
//! The cart is re-synchronized against the published [`Catalog`] on
//! [`CartStore::hydrate`]: vanished products drop out, titles and prices are
//! refreshed, quantities survive.

mod favourites;
mod line_item;
pub mod memory;
mod ports;
mod store;

pub use favourites::FavouritesStore;
pub use line_item::{CatalogProduct, LineItem, count, reconcile_items, total};
pub use ports::{Catalog, CatalogError, ClientStorage};
pub use store::CartStore;

/// Storage keys.
pub mod keys {
    /// Current cart key.
    pub const CART: &str = "cart:v3";
    /// Keys written by earlier cart layouts.
    pub const LEGACY_CART: &[&str] = &["cart", "cart:v1", "cart:v2"];
    /// Current favourites key.
    pub const FAVOURITES: &str = "favourites:v2";
    /// Keys written by earlier favourites layouts.
    pub const LEGACY_FAVOURITES: &[&str] = &["favourites", "favourites:v1"];
}
