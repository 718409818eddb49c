//! One-at-a-time handling of cart and favourites requests per session.
//!
//! tower-sessions loads the session record when a handler first reads it and
//! saves the whole record after the handler returns. Two overlapping cart
//! requests from one visitor would each save their own copy and the later
//! save would drop the other's edit. This layer sits outside the session
//! layer and holds a per-session mutex around load, handler and save.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::header::COOKIE,
    middleware::Next,
    response::Response,
};
use moka::future::Cache;
use tokio::sync::Mutex;
use tower_sessions::cookie::Cookie;
use tracing::trace;

use super::session::SESSION_COOKIE_NAME;

/// Locks for sessions idle longer than this are dropped.
const LOCK_IDLE: Duration = Duration::from_secs(15 * 60);

const MAX_LOCKS: u64 = 100_000;

/// Route prefixes whose handlers read and write the cart or favourites.
const CLIENT_STATE_PATHS: &[&str] = &[
    "/cart",
    "/favourites",
    "/checkout",
    "/api/cart",
    "/api/favourites",
];

/// One async mutex per session id.
#[derive(Clone)]
pub struct VisitorLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl Default for VisitorLocks {
    fn default() -> Self {
        Self {
            locks: Cache::builder()
                .max_capacity(MAX_LOCKS)
                .time_to_idle(LOCK_IDLE)
                .build(),
        }
    }
}

impl VisitorLocks {
    /// The mutex for `session_id`, created on first use.
    pub async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .get_with(session_id.to_owned(), async { Arc::new(Mutex::new(())) })
            .await
    }
}

fn writes_client_state(path: &str) -> bool {
    CLIENT_STATE_PATHS.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn session_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
}

/// Serialize client-state requests that carry a session cookie.
///
/// Visitors without a cookie have nothing stored yet and pass straight
/// through.
pub async fn serialize_client_state(
    State(locks): State<VisitorLocks>,
    request: Request,
    next: Next,
) -> Response {
    if !writes_client_state(request.uri().path()) {
        return next.run(request).await;
    }
    let Some(session_id) = session_cookie(&request) else {
        return next.run(request).await;
    };

    let lock = locks.lock_for(&session_id).await;
    let _guard = lock.lock().await;
    trace!(path = %request.uri().path(), "Holding visitor lock");
    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Method, StatusCode, header::SET_COOKIE},
        middleware::from_fn_with_state,
        routing::{get, post},
    };
    use rust_decimal::Decimal;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, Session};

    use handset_core::ProductId;
    use handset_core::cart::memory::MemoryCatalog;
    use handset_core::cart::{Catalog, CatalogError, CartStore, CatalogProduct, LineItem};

    use super::*;
    use crate::config::tests::test_config;
    use crate::middleware::{SessionStorage, session_layer};

    fn phone() -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(1),
            title: "Pixel 9".into(),
            slug: "pixel-9".into(),
            price: Decimal::new(799, 0),
            compare_at_price: None,
            on_sale: false,
            featured_image: None,
        }
    }

    /// Yields before answering so overlapping requests interleave.
    struct SlowCatalog(MemoryCatalog);

    impl Catalog for SlowCatalog {
        async fn published_products(
            &self,
            ids: &[ProductId],
        ) -> Result<Vec<CatalogProduct>, CatalogError> {
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            self.0.published_products(ids).await
        }
    }

    fn cart(session: Session) -> CartStore<SessionStorage, SlowCatalog> {
        CartStore::new(
            SessionStorage::new(session),
            SlowCatalog(MemoryCatalog::with(vec![phone()])),
            Duration::from_secs(1),
        )
    }

    async fn add(session: Session) -> StatusCode {
        cart(session).add_item(LineItem::from_product(&phone())).await;
        StatusCode::NO_CONTENT
    }

    async fn hydrated_count(session: Session) -> String {
        let store = cart(session);
        store.hydrate().await;
        store.count().await.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/cart/add", post(add))
            .route("/cart/count", get(hydrated_count))
            .layer(session_layer(MemoryStore::default(), &test_config()))
            .layer(from_fn_with_state(VisitorLocks::default(), serialize_client_state))
    }

    fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn test_client_state_paths() {
        assert!(writes_client_state("/cart"));
        assert!(writes_client_state("/cart/add"));
        assert!(writes_client_state("/api/favourites"));
        assert!(writes_client_state("/checkout"));
        assert!(!writes_client_state("/cartography"));
        assert!(!writes_client_state("/products/pixel-9"));
    }

    #[test]
    fn test_session_cookie_is_found_among_others() {
        let with_cookie = request(
            Method::GET,
            "/cart",
            Some("theme=dark; hs_session=abc123; lang=en"),
        );
        assert_eq!(session_cookie(&with_cookie).as_deref(), Some("abc123"));

        let without = request(Method::GET, "/cart", Some("theme=dark"));
        assert!(session_cookie(&without).is_none());
    }

    #[tokio::test]
    async fn test_same_session_gets_same_lock() {
        let locks = VisitorLocks::default();
        let a = locks.lock_for("one").await;
        let b = locks.lock_for("one").await;
        let c = locks.lock_for("two").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_overlapping_adds_on_one_session_are_not_lost() {
        let app = app();

        let first = app
            .clone()
            .oneshot(request(Method::POST, "/cart/add", None))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        let set_cookie = first.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_owned();

        let (a, b) = tokio::join!(
            app.clone()
                .oneshot(request(Method::POST, "/cart/add", Some(&cookie))),
            app.clone()
                .oneshot(request(Method::POST, "/cart/add", Some(&cookie))),
        );
        assert_eq!(a.unwrap().status(), StatusCode::NO_CONTENT);
        assert_eq!(b.unwrap().status(), StatusCode::NO_CONTENT);

        let total = app
            .clone()
            .oneshot(request(Method::GET, "/cart/count", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(text(total).await, "3");
    }
}
