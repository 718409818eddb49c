//! Authentication error types.

use thiserror::Error;

use handset_core::EmailError;
use handset_core::session::StoreError;

/// Errors raised while signing a visitor in through the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The `state` returned by the provider does not match the one we issued.
    #[error("oauth state mismatch")]
    StateMismatch,

    /// The callback carried no authorization code.
    #[error("authorization code missing")]
    MissingCode,

    /// The visitor declined, or the provider refused the request.
    #[error("provider denied authorization: {0}")]
    Denied(String),

    /// The provider answered with an unexpected status or body.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The userinfo response had no email; profiles require one.
    #[error("provider did not return an email address")]
    MissingEmail,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("profile store error: {0}")]
    Profile(#[from] StoreError),

    #[error("session error: {0}")]
    Session(String),
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Session(e.to_string())
    }
}

impl AuthError {
    /// Short code appended to `/auth/login?error=` so the login page can explain.
    #[must_use]
    pub const fn login_code(&self) -> &'static str {
        match self {
            Self::StateMismatch | Self::Session(_) => "invalid_state",
            Self::MissingCode => "missing_code",
            Self::Denied(_) => "denied",
            Self::Provider(_) | Self::Http(_) => "provider",
            Self::MissingEmail | Self::InvalidEmail(_) => "email",
            Self::Profile(StoreError::EmailTaken) => "email_taken",
            Self::Profile(_) => "profile",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_codes() {
        assert_eq!(AuthError::StateMismatch.login_code(), "invalid_state");
        assert_eq!(AuthError::MissingEmail.login_code(), "email");
        assert_eq!(
            AuthError::Profile(StoreError::EmailTaken).login_code(),
            "email_taken"
        );
        assert_eq!(AuthError::Profile(StoreError::NotFound).login_code(), "profile");
    }
}
