//! HTTP route handlers for the storefront and dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database ping)
//! GET  /                       - Home page
//! GET  /about                  - About page
//! GET  /contact                - Contact page
//! POST /contact                - Store a contact message (rate limited)
//!
//! # Catalog
//! GET  /products               - Listing with search, filters, sort, pagination
//! GET  /products/{slug}        - Product detail
//! GET  /categories/{slug}      - Category listing
//!
//! # Blog
//! GET  /blog                   - Published posts
//! GET  /blog/{slug}            - Post
//!
//! # Cart and favourites (session-backed)
//! GET  /cart                   - Cart page (reconciles against the catalog)
//! POST /cart/add|update|remove|clear
//! GET  /favourites             - Saved products
//! POST /favourites/toggle
//! GET  /api/cart               - Cart JSON (rate limited)
//! GET  /api/favourites         - Favourite ids JSON (rate limited)
//!
//! # Checkout and account (requires sign-in)
//! GET  /checkout               - Shipping form
//! POST /checkout               - Place order (rate limited)
//! GET  /account                - Overview
//! GET  /account/orders         - Order history
//! GET  /account/orders/{id}    - Order detail
//! GET  /account/orders/{id}/invoice.pdf
//!
//! # Auth (rate limited)
//! GET  /auth/login             - Sign-in page
//! GET  /auth/oauth/start       - Redirect to the identity provider
//! GET  /auth/callback          - Authorization code callback
//! POST /auth/logout
//! GET  /unauthorized
//!
//! # SEO
//! GET  /sitemap.xml
//! GET  /robots.txt
//!
//! # Staff
//! /dashboard/...               - See [`dashboard`]
//! ```

pub mod account;
pub mod auth;
pub mod blog;
pub mod cart;
pub mod checkout;
pub mod dashboard;
pub mod favourites;
pub mod home;
pub mod pages;
pub mod products;
pub mod seo;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, form_rate_limiter};
use crate::state::AppState;

/// Sign-in flow, behind the auth rate limiter.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page))
        .route("/oauth/start", get(auth::start))
        .route("/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Catalog pages.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Signed-in customer pages.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
        .route("/orders/{id}/invoice.pdf", get(account::invoice))
}

/// JSON endpoints for client scripts.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::api_show))
        .route("/favourites", get(favourites::api_index))
        .layer(api_rate_limiter())
}

/// Form posts that write rows, behind the form rate limiter.
fn limited_forms() -> Router<AppState> {
    Router::new()
        .route("/contact", post(pages::submit_contact))
        .route("/checkout", post(checkout::place_order))
        .layer(form_rate_limiter())
}

/// Create all routes for the storefront and dashboard.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(seo::health))
        .route("/health/ready", get(seo::readiness))
        .route("/", get(home::home))
        .route("/about", get(pages::about))
        .route("/contact", get(pages::contact))
        .route("/checkout", get(checkout::show))
        .merge(limited_forms())
        .nest("/products", product_routes())
        .route("/categories/{slug}", get(products::category))
        .route("/blog", get(blog::index))
        .route("/blog/{slug}", get(blog::show))
        .nest("/cart", cart_routes())
        .route("/favourites", get(favourites::index))
        .route("/favourites/toggle", post(favourites::toggle))
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
        .route("/unauthorized", get(auth::unauthorized))
        .route("/sitemap.xml", get(seo::sitemap))
        .route("/robots.txt", get(seo::robots))
        .nest("/api", api_routes())
        .nest("/dashboard", dashboard::routes())
}
