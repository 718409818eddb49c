//! `PostgreSQL` repositories.
//!
//! One database, several schemas:
//!
//! - `app` - profiles
//! - `catalog` - categories and products
//! - `sales` - orders and order items
//! - `content` - pages, posts and contact messages
//! - `seo` - meta tags, keywords and schema markup
//! - `tower_sessions` - session storage, owned by `tower-sessions-sqlx-store`
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow` rows) and
//! every row is converted into its domain model through `TryFrom`, so bad data
//! surfaces as [`RepositoryError::DataCorruption`] instead of a panic.
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/` and are run via:
//! ```bash
//! cargo run -p handset-cli -- migrate
//! ```

pub mod categories;
pub mod content;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod seo;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use content::{MessageRepository, PageRepository, PostRepository};
pub use orders::OrderRepository;
pub use products::{PgCatalog, ProductRepository};
pub use profiles::{PgProfileStore, ProfileRepository};
pub use seo::SeoRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("{0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to [`RepositoryError::Conflict`] with `message`.
    pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return Self::Conflict(message.to_owned());
            }
            Self::Database(e)
        }
    }
}

/// Decode a `TEXT` status column.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
