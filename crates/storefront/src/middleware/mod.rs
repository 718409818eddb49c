//! HTTP middleware and request extractors.
//!
//! # Middleware order (outermost first, see [`crate::app`])
//!
//! 1. Sentry layers (hub per request, error capture)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span)
//! 4. CSP nonce
//! 5. Security headers (reads the nonce)
//! 6. Visitor lock (cart and favourites requests, one at a time per session)
//! 7. Session layer (tower-sessions, `PostgreSQL` store)
//! 8. Route-level rate limiting (governor)
//!
//! Authentication is not a layer: handlers opt in with the extractors in
//! [`auth`].

pub mod auth;
pub mod client_storage;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod visitor_lock;

pub use auth::{
    AccessDenied, AdminOnly, GuardRejection, OptionalProfile, RequestSession, RequireAuth, RequirePermission,
    RequireRole, SessionIdentity, Staff, can, request_uri, sign_in,
};
pub use client_storage::{SessionCart, SessionFavourites, SessionStorage, cart_for, favourites_for};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, form_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, session_layer};
pub use visitor_lock::{VisitorLocks, serialize_client_state};
