//! Handset storefront and staff dashboard.
//!
//! The binary in `main.rs` wires configuration, the database pool and the
//! session store into [`app`]; integration tests build the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod views;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::middleware::{
    csp_nonce_middleware, request_id_middleware, security_headers_middleware,
    serialize_client_state,
};
use crate::state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: Sentry, trace span, request id, CSP nonce,
/// security headers, visitor lock, session. Rate limits are applied per route group in
/// [`routes::routes`].
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let static_dir = ServeDir::new(&state.config().static_dir);

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", static_dir)
        .layer(session_layer)
        .layer(from_fn_with_state(
            state.visitor_locks().clone(),
            serialize_client_state,
        ))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(csp_nonce_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::tests::test_config;
    use crate::content::FallbackPages;

    fn test_app() -> Router {
        let config = test_config();
        // Never connects: these routes do not touch the database.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/handset_test")
            .unwrap();
        let sessions = middleware::session_layer(MemoryStore::default(), &config);
        let state = AppState::with_pages(config, pool, FallbackPages::default());
        app(state, sessions)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_carries_security_headers() {
        let response = test_app().oneshot(request(Method::GET, "/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(headers.contains_key("x-request-id"));
        assert!(headers.contains_key("content-security-policy"));
        assert_eq!(headers["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_empty_cart_json() {
        let response = test_app().oneshot(request(Method::GET, "/api/cart")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["count"], 0);
        assert_eq!(body["items"], serde_json::json!([]));
        assert_eq!(body["currency"], "USD");
    }

    #[tokio::test]
    async fn test_empty_favourites_json() {
        let response = test_app()
            .oneshot(request(Method::GET, "/api/favourites"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["ids"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_anonymous_dashboard_redirects_to_login() {
        let response = test_app().oneshot(request(Method::GET, "/dashboard")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login?return_to=%2Fdashboard"
        );
    }

    #[tokio::test]
    async fn test_anonymous_account_redirects_to_login() {
        let response = test_app()
            .oneshot(request(Method::GET, "/account/orders"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login?return_to=%2Faccount%2Forders"
        );
    }

    #[tokio::test]
    async fn test_anonymous_dashboard_api_is_json_401() {
        let mut req = request(Method::POST, "/dashboard/api/orders/1/status");
        req.headers_mut()
            .insert("content-type", "application/json".parse().unwrap());
        *req.body_mut() = Body::from(r#"{"status":"shipped"}"#);

        let response = test_app().oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = test_app()
            .oneshot(request(Method::GET, "/no-such-page"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
