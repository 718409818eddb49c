//! Domain models for the storefront and dashboard.
//!
//! Row-to-model conversion lives in [`crate::db`]; these types are what
//! handlers and templates see.

pub mod catalog;
pub mod content;
pub mod order;
pub mod seo;
pub mod session;

pub use catalog::{
    Category, Paginated, Product, ProductDraft, ProductInput, ProductQuery, ProductQueryParams,
    ProductSort,
};
pub use content::{ContactMessage, ContentPage, NewContactMessage, Post, PostDraft, PostInput};
pub use order::{NewOrder, Order, OrderItem, OrderSummary, ShippingDetails};
pub use seo::{Keyword, KeywordInput, MetaTag, MetaTagInput, SchemaInput, SchemaKind, SchemaMarkup};
pub use session::keys as session_keys;
