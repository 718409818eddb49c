//! Authentication and authorization extractors.
//!
//! Every request gets one [`RequestSession`]: a
//! [`SessionResolver`] over the tower-sessions identity and the profile
//! table. It is built lazily by the first extractor that asks for it and
//! cached in the request extensions, so a handler taking both
//! [`RequirePermission`] and [`OptionalProfile`] hits the database once.
//!
//! Denials become a redirect for pages and a JSON `{ error, code }` body
//! with 401/403 for `/api/` and `/dashboard/api/` routes.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::warn;

use handset_core::Role;
use handset_core::session::{
    Denial, Identity, IdentityProvider, Permission, Profile, SessionResolver,
};

use crate::db::PgProfileStore;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::session_keys;
use crate::state::AppState;

/// The full request URI. Nested routers see `parts.uri` with their prefix
/// stripped.
#[must_use]
pub fn request_uri(parts: &Parts) -> &Uri {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
}

// =============================================================================
// Identity provider
// =============================================================================

/// The signed-in [`Identity`] as stored in the session cookie's record.
#[derive(Clone, Debug)]
pub struct SessionIdentity {
    session: Session,
}

impl SessionIdentity {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl IdentityProvider for SessionIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        match self.session.get::<Identity>(session_keys::IDENTITY).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Failed to read identity from session");
                None
            }
        }
    }

    async fn sign_out(&self) {
        if let Err(e) = self.session.remove_value(session_keys::IDENTITY).await {
            warn!(error = %e, "Failed to remove identity from session");
        }
        if let Err(e) = self.session.cycle_id().await {
            warn!(error = %e, "Failed to cycle session id on sign-out");
        }
        clear_sentry_user();
    }
}

/// Store `identity` in the session, rotating the session id first.
///
/// # Errors
///
/// Returns an error if the session backend rejects the write.
pub async fn sign_in(session: &Session, identity: &Identity) -> Result<(), AppError> {
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session cycle failed: {e}")))?;
    session
        .insert(session_keys::IDENTITY, identity)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    set_sentry_user(&identity.id, Some(identity.email.as_str()));
    Ok(())
}

// =============================================================================
// Per-request resolver
// =============================================================================

pub type SessionResolverImpl = SessionResolver<SessionIdentity, PgProfileStore>;

/// The request's memoized session resolver.
#[derive(Clone)]
pub struct RequestSession(pub Arc<SessionResolverImpl>);

impl RequestSession {
    #[must_use]
    pub fn resolver(&self) -> &SessionResolverImpl {
        &self.0
    }
}

impl FromRequestParts<AppState> for RequestSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }

        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let resolved = Self(Arc::new(SessionResolver::new(
            SessionIdentity::new(session),
            state.profile_store(),
            Arc::clone(state.permissions()),
        )));
        parts.extensions.insert(resolved.clone());
        Ok(resolved)
    }
}

// =============================================================================
// Rejection
// =============================================================================

/// A guard refused the request.
#[derive(Debug)]
pub struct AccessDenied {
    denial: Denial,
    api: bool,
    return_to: Option<String>,
}

#[derive(Serialize)]
struct DenialBody {
    error: &'static str,
    code: &'static str,
}

impl AccessDenied {
    pub(crate) fn from_parts(denial: Denial, parts: &Parts) -> Self {
        let uri = request_uri(parts);
        let path = uri.path();
        let api = path.starts_with("/api/") || path.starts_with("/dashboard/api/");
        let return_to = (denial == Denial::Unauthenticated && parts.method == axum::http::Method::GET)
            .then(|| {
                uri.path_and_query()
                    .map_or_else(|| path.to_owned(), ToString::to_string)
            });
        Self {
            denial,
            api,
            return_to,
        }
    }

    #[must_use]
    pub const fn denial(&self) -> Denial {
        self.denial
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        if self.api {
            let status = match self.denial {
                Denial::Unauthenticated => StatusCode::UNAUTHORIZED,
                Denial::Forbidden => StatusCode::FORBIDDEN,
            };
            return (
                status,
                Json(DenialBody {
                    error: self.denial.message(),
                    code: self.denial.code(),
                }),
            )
                .into_response();
        }

        match self.return_to {
            Some(return_to) => Redirect::to(&format!(
                "{}?return_to={}",
                self.denial.redirect_to(),
                urlencoding::encode(&return_to)
            ))
            .into_response(),
            None => Redirect::to(self.denial.redirect_to()).into_response(),
        }
    }
}

/// Rejection of the guard extractors.
#[derive(Debug)]
pub enum GuardRejection {
    Denied(AccessDenied),
    Internal(AppError),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Denied(denied) => denied.into_response(),
            Self::Internal(err) => err.into_response(),
        }
    }
}

impl From<AppError> for GuardRejection {
    fn from(err: AppError) -> Self {
        Self::Internal(err)
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor that requires a signed-in identity.
///
/// ```rust,ignore
/// async fn account(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", identity.email)
/// }
/// ```
pub struct RequireAuth(pub Identity);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = RequestSession::from_request_parts(parts, state).await?;
        session
            .resolver()
            .require_auth()
            .await
            .into_result()
            .map(Self)
            .map_err(|denial| GuardRejection::Denied(AccessDenied::from_parts(denial, parts)))
    }
}

/// A set of roles allowed through [`RequireRole`].
pub trait RoleGuard: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

/// Admins, editors and SEO managers.
pub struct Staff;

impl RoleGuard for Staff {
    const ALLOWED: &'static [Role] = Role::STAFF;
}

pub struct AdminOnly;

impl RoleGuard for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Extractor that requires the profile's role to be in `G::ALLOWED`.
pub struct RequireRole<G>(pub Profile, pub PhantomData<G>);

impl<G: RoleGuard> FromRequestParts<AppState> for RequireRole<G> {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = RequestSession::from_request_parts(parts, state).await?;
        session
            .resolver()
            .require_role(G::ALLOWED)
            .await
            .into_result()
            .map(|profile| Self(profile, PhantomData))
            .map_err(|denial| GuardRejection::Denied(AccessDenied::from_parts(denial, parts)))
    }
}

/// A single permission checked by [`RequirePermission`].
pub trait PermissionGuard: Send + Sync + 'static {
    const PERMISSION: Permission;
}

/// Marker types naming each [`Permission`] at the type level.
pub mod can {
    use super::{Permission, PermissionGuard};

    macro_rules! permission_guards {
        ($($name:ident),+ $(,)?) => {
            $(
                pub struct $name;

                impl PermissionGuard for $name {
                    const PERMISSION: Permission = Permission::$name;
                }
            )+
        };
    }

    permission_guards!(
        DashboardView,
        ProductsRead,
        ProductsWrite,
        OrdersRead,
        OrdersWrite,
        ContentWrite,
        BlogWrite,
        MessagesRead,
        SeoRead,
        SeoWrite,
        UsersManage,
    );
}

/// Extractor that requires `P::PERMISSION` for the profile's role.
///
/// ```rust,ignore
/// async fn edit(RequirePermission(profile, _): RequirePermission<can::ProductsWrite>) {}
/// ```
pub struct RequirePermission<P>(pub Profile, pub PhantomData<P>);

impl<P: PermissionGuard> FromRequestParts<AppState> for RequirePermission<P> {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = RequestSession::from_request_parts(parts, state).await?;
        session
            .resolver()
            .require_permission(P::PERMISSION)
            .await
            .into_result()
            .map(|profile| Self(profile, PhantomData))
            .map_err(|denial| GuardRejection::Denied(AccessDenied::from_parts(denial, parts)))
    }
}

/// Extractor that optionally gets the signed-in profile. Never rejects.
pub struct OptionalProfile(pub Option<Profile>);

impl FromRequestParts<AppState> for OptionalProfile {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = RequestSession::from_request_parts(parts, state).await?;
        Ok(Self(session.resolver().current_profile().await.cloned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, Request};
    use handset_core::{Email, UserId};
    use tower_sessions::MemoryStore;

    use super::*;

    fn parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[test]
    fn test_page_denial_redirects_with_return_to() {
        let denied = AccessDenied::from_parts(
            Denial::Unauthenticated,
            &parts(Method::GET, "/account/orders?page=2"),
        );
        let response = denied.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login?return_to=%2Faccount%2Forders%3Fpage%3D2"
        );
    }

    #[test]
    fn test_nested_route_uses_original_uri() {
        let mut nested = parts(Method::GET, "/orders");
        nested
            .extensions
            .insert(OriginalUri("/dashboard/orders".parse().unwrap()));
        let response = AccessDenied::from_parts(Denial::Unauthenticated, &nested).into_response();
        assert_eq!(
            response.headers()["location"],
            "/auth/login?return_to=%2Fdashboard%2Forders"
        );
    }

    #[test]
    fn test_forbidden_page_goes_to_unauthorized() {
        let denied =
            AccessDenied::from_parts(Denial::Forbidden, &parts(Method::GET, "/dashboard/users"));
        let response = denied.into_response();
        assert_eq!(response.headers()["location"], "/unauthorized");
    }

    #[tokio::test]
    async fn test_api_denial_is_json() {
        let denied = AccessDenied::from_parts(
            Denial::Forbidden,
            &parts(Method::POST, "/dashboard/api/products"),
        );
        let response = denied.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "forbidden");

        let denied =
            AccessDenied::from_parts(Denial::Unauthenticated, &parts(Method::POST, "/api/cart"));
        assert_eq!(denied.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_identity_sign_in_and_out() {
        let session = session();
        let provider = SessionIdentity::new(session.clone());
        assert!(provider.current_identity().await.is_none());

        let identity = Identity {
            id: UserId::from_subject("https://id.test", "42"),
            email: Email::parse("ada@shop.test").unwrap(),
            full_name: Some("Ada".to_owned()),
            avatar_url: None,
        };
        sign_in(&session, &identity).await.unwrap();
        assert_eq!(provider.current_identity().await, Some(identity));

        provider.sign_out().await;
        assert!(provider.current_identity().await.is_none());
    }
}
