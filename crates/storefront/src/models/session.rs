//! Session keys.
//!
//! The identity, pending OAuth login, and client storage for the cart and
//! favourites all live in the visitor's `tower-sessions` session.

/// Keys for values stored directly in the session.
pub mod keys {
    /// Signed-in [`Identity`](handset_core::session::Identity).
    pub const IDENTITY: &str = "identity";

    /// [`PendingLogin`](crate::services::auth::PendingLogin) between the
    /// provider redirect and the callback.
    pub const PENDING_LOGIN: &str = "oauth_pending";

    /// Prefix for values written through
    /// [`SessionStorage`](crate::middleware::SessionStorage).
    pub const CLIENT_STORAGE_PREFIX: &str = "client:";

    /// One-shot notice rendered on the next page.
    pub const FLASH: &str = "flash";
}
