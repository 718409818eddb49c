//! Newtype IDs for type-safe entity references.
//!
//! Catalog, sales and content rows use `SERIAL` keys wrapped by
//! `define_id!`. Profiles are keyed by [`UserId`], a UUID derived from the
//! identity provider's issuer and subject.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines an `i32`-backed id newtype.
///
/// The generated type is `Copy`, ordered, hashes like its inner value,
/// serializes transparently and, with the `postgres` feature, encodes as
/// `INTEGER`. `FromStr` lets axum path extractors parse it directly.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database key.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw database key.
            #[must_use]
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Key of a `catalog.product` row; also the cart line-item key.
    ProductId
);
define_id!(CategoryId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(PostId);
define_id!(ContactMessageId);
define_id!(MetaTagId);
define_id!(KeywordId);
define_id!(SchemaMarkupId);

/// Profile identifier.
///
/// Derived with UUID v5 from `issuer` and `subject` so the same external
/// account always lands on the same `app.profile` row, whichever session it
/// signs in from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Derive the id for an external account.
    #[must_use]
    pub fn from_subject(issuer: &str, subject: &str) -> Self {
        let namespace = Uuid::new_v5(&Uuid::NAMESPACE_URL, issuer.as_bytes());
        Self(Uuid::new_v5(&namespace, subject.as_bytes()))
    }

    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_is_stable_per_subject() {
        let a = UserId::from_subject("https://id.example.com", "user-1");
        let b = UserId::from_subject("https://id.example.com", "user-1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_id_differs_across_issuers() {
        let a = UserId::from_subject("https://id.example.com", "user-1");
        let b = UserId::from_subject("https://other.example.com", "user-1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_product_id_parses_from_path_segment() {
        let id: ProductId = " 42".parse().unwrap();
        assert_eq!(id, ProductId::new(42));
        assert!("abc".parse::<ProductId>().is_err());
    }

    #[test]
    fn test_id_serializes_transparently() {
        assert_eq!(serde_json::to_string(&OrderId::new(7)).unwrap(), "7");
        let id = UserId::from_subject("iss", "sub");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
