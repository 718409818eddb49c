//! `OpenID` Connect sign-in.
//!
//! Authorization-code flow with PKCE (`S256`) against any standards-compliant
//! provider. The flow is:
//!
//! 1. [`OAuthClient::authorization_request`] builds the provider URL plus the
//!    `state` and verifier the callback must present. Both are stored in the
//!    visitor's session as a [`PendingLogin`].
//! 2. The provider redirects back with `code` and `state`.
//! 3. [`OAuthClient::identity_for_code`] exchanges the code, fetches
//!    userinfo, and maps it onto an [`Identity`].

mod error;
pub mod pkce;

pub use error::AuthError;

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use url::Url;

use handset_core::session::Identity;
use handset_core::{Email, UserId};

use crate::config::OAuthConfig;

/// Callback path registered with the provider.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// What the callback needs to finish a login, kept in the session meanwhile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingLogin {
    pub state: String,
    pub verifier: String,
    /// Local path to land on after signing in.
    pub return_to: Option<String>,
}

impl PendingLogin {
    /// Where to send the user once signed in. Only site-local paths are honored.
    #[must_use]
    pub fn destination(&self) -> &str {
        self.return_to
            .as_deref()
            .filter(|path| is_local_path(path))
            .unwrap_or("/account")
    }
}

/// `true` for `/foo` but not `//evil.test` or absolute URLs.
#[must_use]
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// A provider redirect ready to be followed.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub pending: PendingLogin,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Standard OIDC userinfo claims.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// OIDC client for the configured provider.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<OAuthClientInner>,
}

struct OAuthClientInner {
    client: reqwest::Client,
    config: OAuthConfig,
    redirect_uri: String,
}

impl OAuthClient {
    #[must_use]
    pub fn new(config: &OAuthConfig, base_url: &str) -> Self {
        Self {
            inner: Arc::new(OAuthClientInner {
                client: reqwest::Client::new(),
                config: config.clone(),
                redirect_uri: format!("{base_url}{CALLBACK_PATH}"),
            }),
        }
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.inner.redirect_uri
    }

    /// Build the provider redirect with fresh `state` and PKCE verifier.
    #[must_use]
    pub fn authorization_request(&self, return_to: Option<String>) -> AuthorizationRequest {
        let pending = PendingLogin {
            state: pkce::random_token(24),
            verifier: pkce::code_verifier(),
            return_to,
        };

        let mut url = self.inner.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.inner.config.client_id)
            .append_pair("redirect_uri", &self.inner.redirect_uri)
            .append_pair("scope", &self.inner.config.scopes)
            .append_pair("state", &pending.state)
            .append_pair("code_challenge", &pkce::code_challenge(&pending.verifier))
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest { url, pending }
    }

    /// Exchange an authorization code and resolve the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] for transport failures, provider errors, or a
    /// userinfo response without a usable email.
    pub async fn identity_for_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<Identity, AuthError> {
        let token = self.exchange_code(code, verifier).await?;
        let info = self.userinfo(&token.access_token).await?;
        self.identity_from(info)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, AuthError> {
        let config = &self.inner.config;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.inner.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose_secret()),
            ("code_verifier", verifier),
        ];

        let response = self
            .inner
            .client
            .post(config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ProviderError>(&text).map_or(text, |e| {
                format!(
                    "{}: {}",
                    e.error,
                    e.error_description.unwrap_or_default()
                )
            });
            return Err(AuthError::Provider(format!(
                "token exchange failed ({status}): {detail}"
            )));
        }

        Ok(response.json().await?)
    }

    async fn userinfo(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let response = self
            .inner
            .client
            .get(self.inner.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "userinfo request failed ({})",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Map provider claims onto an identity with a stable id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingEmail`] or [`AuthError::InvalidEmail`].
    pub fn identity_from(&self, info: UserInfo) -> Result<Identity, AuthError> {
        let email = info
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(AuthError::MissingEmail)?;

        Ok(Identity {
            id: UserId::from_subject(&self.inner.config.issuer, &info.sub),
            email: Email::parse(email)?,
            full_name: info.name.filter(|n| !n.trim().is_empty()),
            avatar_url: info.picture.filter(|p| p.starts_with("https://")),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::tests::test_config;

    fn client() -> OAuthClient {
        let config = test_config();
        OAuthClient::new(&config.oauth, &config.base_url)
    }

    #[test]
    fn test_authorization_url_carries_pkce_and_state() {
        let request = client().authorization_request(Some("/checkout".into()));
        let query: HashMap<_, _> = request.url.query_pairs().into_owned().collect();

        assert_eq!(request.url.host_str(), Some("id.handset.test"));
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "handset-web");
        assert_eq!(query["redirect_uri"], "http://localhost:3000/auth/callback");
        assert_eq!(query["state"], request.pending.state);
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(
            query["code_challenge"],
            pkce::code_challenge(&request.pending.verifier)
        );
        assert_eq!(request.pending.destination(), "/checkout");
    }

    #[test]
    fn test_destination_rejects_open_redirects() {
        let pending = |to: &str| PendingLogin {
            state: String::new(),
            verifier: String::new(),
            return_to: Some(to.to_owned()),
        };
        assert_eq!(pending("//evil.test/x").destination(), "/account");
        assert_eq!(pending("https://evil.test").destination(), "/account");
        assert_eq!(pending("/cart").destination(), "/cart");
    }

    #[test]
    fn test_identity_from_userinfo() {
        let client = client();
        let identity = client
            .identity_from(UserInfo {
                sub: "abc".into(),
                email: Some("Buyer@Handset.Test".into()),
                name: Some("Buyer".into()),
                picture: Some("http://insecure.test/a.png".into()),
            })
            .unwrap();

        assert_eq!(identity.id, UserId::from_subject("https://id.handset.test", "abc"));
        assert_eq!(identity.email.as_str(), "buyer@handset.test");
        assert_eq!(identity.avatar_url, None);
    }

    #[test]
    fn test_identity_requires_email() {
        let err = client()
            .identity_from(UserInfo {
                sub: "abc".into(),
                email: None,
                name: None,
                picture: None,
            })
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingEmail));
    }
}
