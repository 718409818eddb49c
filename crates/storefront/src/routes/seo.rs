//! `sitemap.xml`, `robots.txt` and health endpoints.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;

const DOCUMENT_CACHE: &str = "public, max-age=3600";

/// `GET /sitemap.xml`
#[instrument(skip_all)]
pub async fn sitemap(State(state): State<AppState>) -> Result<Response> {
    let xml = state.seo().sitemap(state.pool(), state.config()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, DOCUMENT_CACHE),
        ],
        xml.to_string(),
    )
        .into_response())
}

/// `GET /robots.txt`
#[instrument(skip_all)]
pub async fn robots(State(state): State<AppState>) -> Result<Response> {
    let txt = state.seo().robots(state.pool(), state.config()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, DOCUMENT_CACHE),
        ],
        txt.to_string(),
    )
        .into_response())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
