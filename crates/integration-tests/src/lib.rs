//! Integration tests for Handset.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process flows over the core stores
//! cargo test -p handset-integration-tests
//!
//! # Against a running, migrated and seeded storefront
//! handset migrate && handset seed
//! cargo run -p handset-storefront &
//! cargo test -p handset-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `shopping_flow` - cart, favourites and role administration over the
//!   in-memory adapters
//! - `storefront_pages` - public pages, headers, sitemap (live server)
//! - `access_control` - sign-in redirects and JSON denials (live server)
//! - `cart_api` - session cart through the HTTP surface (live server)

use reqwest::Client;

/// Base URL of the storefront under test (`STOREFRONT_BASE_URL`).
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_owned())
        .trim_end_matches('/')
        .to_owned()
}

/// Cookie-keeping client that does not follow redirects, so tests can
/// assert on `Location`.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the storefront database (`STOREFRONT_DATABASE_URL` or `DATABASE_URL`).
///
/// # Errors
///
/// Returns `sqlx::Error` if the variable is unset or the connection fails.
pub async fn database() -> Result<sqlx::PgPool, sqlx::Error> {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| sqlx::Error::Configuration("STOREFRONT_DATABASE_URL not set".into()))?;
    sqlx::PgPool::connect(&url).await
}
