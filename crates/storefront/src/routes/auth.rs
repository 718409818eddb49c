//! Authentication route handlers.
//!
//! Sign-in goes through the configured OpenID Connect provider
//! (authorization code with PKCE):
//! - `/auth/oauth/start` stores a [`PendingLogin`] and redirects out
//! - `/auth/callback` checks `state`, exchanges the code, records the login
//!   and puts the identity in the session
//! - `/auth/logout` drops the identity and rotates the session id

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use handset_core::session::record_login;

use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{RequestSession, sign_in};
use crate::models::session_keys;
use crate::services::auth::{AuthError, PendingLogin, is_local_path};
use crate::services::seo::PageMeta;
use crate::state::AppState;
use crate::views::{Layout, Shell, set_flash};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub return_to: Option<String>,
}

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub error: Option<String>,
    /// `/auth/oauth/start` link, carrying `return_to` through.
    pub start_href: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/unauthorized.html")]
pub struct UnauthorizedTemplate {
    pub layout: Layout,
    pub signed_in: bool,
}

/// Message for a `/auth/login?error=` code.
fn error_message(code: &str) -> &'static str {
    match code {
        "invalid_state" => "Your sign-in session expired. Please try again.",
        "missing_code" | "provider" => "The sign-in provider did not respond as expected. Please try again.",
        "denied" => "Sign-in was cancelled.",
        "email" => "Your account needs a verified email address to sign in.",
        "email_taken" => "That email address already belongs to another account. Sign in with that account or ask the shop to merge them.",
        "profile" => "We couldn't load your profile. Please try again shortly.",
        _ => "Something went wrong while signing you in.",
    }
}

fn start_href(return_to: Option<&str>) -> String {
    match return_to.filter(|p| is_local_path(p)) {
        Some(path) => format!("/auth/oauth/start?return_to={}", urlencoding::encode(path)),
        None => "/auth/oauth/start".to_owned(),
    }
}

/// `GET /auth/login`
#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    shell: Shell,
    Query(query): Query<LoginQuery>,
) -> LoginTemplate {
    LoginTemplate {
        layout: shell.layout_with(&state, PageMeta::new("Sign in").noindex()),
        error: query.error.as_deref().map(|code| error_message(code).to_owned()),
        start_href: start_href(query.return_to.as_deref()),
    }
}

/// `GET /auth/oauth/start?return_to=`
#[instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    let return_to = query.return_to.filter(|p| is_local_path(p));
    let request = state.oauth().authorization_request(return_to);

    if let Err(e) = session
        .insert(session_keys::PENDING_LOGIN, &request.pending)
        .await
    {
        tracing::error!(error = %e, "Failed to store pending login");
        return Redirect::to("/auth/login?error=invalid_state").into_response();
    }

    Redirect::to(request.url.as_str()).into_response()
}

/// `GET /auth/callback`
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match complete_login(&state, &session, query).await {
        Ok(destination) => Redirect::to(&destination).into_response(),
        Err(e) => {
            warn!(error = %e, "Sign-in failed");
            Redirect::to(&format!("/auth/login?error={}", e.login_code())).into_response()
        }
    }
}

/// Finish the provider round trip. Returns where to send the visitor.
async fn complete_login(
    state: &AppState,
    session: &Session,
    query: CallbackQuery,
) -> Result<String, AuthError> {
    // One-time use, whatever the outcome.
    let pending = session
        .remove::<PendingLogin>(session_keys::PENDING_LOGIN)
        .await?
        .ok_or(AuthError::StateMismatch)?;

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(AuthError::Denied(format!("{error} {description}").trim().to_owned()));
    }
    if query.state.as_deref() != Some(pending.state.as_str()) {
        return Err(AuthError::StateMismatch);
    }
    let code = query.code.ok_or(AuthError::MissingCode)?;

    let identity = state
        .oauth()
        .identity_for_code(&code, &pending.verifier)
        .await?;
    let profile = record_login(&state.profile_store(), &identity).await?;
    sign_in(session, &identity)
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;

    add_breadcrumb("auth", "Signed in", Some(&[("role", profile.role.as_str())]));
    info!(user_id = %identity.id, role = %profile.role, "User signed in");
    set_flash(session, format!("Welcome, {}.", profile.display_name())).await;

    Ok(pending.destination().to_owned())
}

/// `POST /auth/logout`
#[instrument(skip_all)]
pub async fn logout(session: Session, RequestSession(resolver): RequestSession) -> Redirect {
    resolver.sign_out().await;
    set_flash(&session, "You have been signed out.").await;
    Redirect::to("/")
}

/// `GET /unauthorized`
#[instrument(skip_all)]
pub async fn unauthorized(
    State(state): State<AppState>,
    shell: Shell,
    RequestSession(resolver): RequestSession,
) -> impl IntoResponse {
    let signed_in = resolver.current_user().await.is_some();
    (
        axum::http::StatusCode::FORBIDDEN,
        UnauthorizedTemplate {
            layout: shell.layout_with(&state, PageMeta::new("Access denied").noindex()),
            signed_in,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_href_keeps_local_return_to() {
        assert_eq!(
            start_href(Some("/account/orders?page=2")),
            "/auth/oauth/start?return_to=%2Faccount%2Forders%3Fpage%3D2"
        );
        assert_eq!(start_href(Some("https://evil.example")), "/auth/oauth/start");
        assert_eq!(start_href(Some("//evil.example")), "/auth/oauth/start");
        assert_eq!(start_href(None), "/auth/oauth/start");
    }

    #[test]
    fn test_unknown_error_code_has_generic_message() {
        assert_eq!(
            error_message("nonsense"),
            "Something went wrong while signing you in."
        );
        assert_eq!(error_message("denied"), "Sign-in was cancelled.");
        assert!(error_message("email_taken").contains("already belongs to another account"));
    }
}
