use serde::Serialize;

/// Why a guard refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// Nobody is signed in, or the signed-in identity has no profile yet.
    Unauthenticated,
    /// Signed in, but the role does not fit.
    Forbidden,
}

impl Denial {
    /// Where an HTML request should be sent.
    #[must_use]
    pub const fn redirect_to(self) -> &'static str {
        match self {
            Self::Unauthenticated => "/auth/login",
            Self::Forbidden => "/unauthorized",
        }
    }

    /// Machine-readable code for JSON error bodies.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Sign in to continue",
            Self::Forbidden => "You do not have access to this page",
        }
    }
}

/// Outcome of a guard: the guarded value, or the reason it was withheld.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<T> {
    Granted(T),
    Denied(Denial),
}

impl<T> Access<T> {
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Convert into a `Result` so handlers can use `?`.
    ///
    /// # Errors
    ///
    /// Returns the [`Denial`] when access was refused.
    pub fn into_result(self) -> Result<T, Denial> {
        match self {
            Self::Granted(value) => Ok(value),
            Self::Denied(denial) => Err(denial),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Access<U> {
        match self {
            Self::Granted(value) => Access::Granted(f(value)),
            Self::Denied(denial) => Access::Denied(denial),
        }
    }
}

impl<T> From<Option<T>> for Access<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Denied(Denial::Unauthenticated), Self::Granted)
    }
}
