//! Staff and customer roles.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a role name is not one of the four known roles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

/// Role carried on a profile.
///
/// `Customer` is the absence of a staff role and the default for anything
/// that cannot be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Every permission, including user administration.
    Admin,
    /// Catalog, orders, content and blog.
    Editor,
    /// SEO tooling plus content and blog.
    SeoManager,
    #[default]
    Customer,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::Admin, Self::Editor, Self::SeoManager, Self::Customer];

    /// Roles allowed into the dashboard.
    pub const STAFF: &'static [Self] = &[Self::Admin, Self::Editor, Self::SeoManager];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::SeoManager => "seo_manager",
            Self::Customer => "customer",
        }
    }

    /// Human label for dashboard tables.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Editor => "Editor",
            Self::SeoManager => "SEO manager",
            Self::Customer => "Customer",
        }
    }

    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Customer)
    }

    /// Lenient parse for stored values: unknown strings become `Customer`.
    #[must_use]
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "seo_manager" => Ok(Self::SeoManager),
            "customer" => Ok(Self::Customer),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_is_rejected_strictly_but_stored_leniently() {
        assert_eq!(
            "owner".parse::<Role>(),
            Err(RoleParseError("owner".to_owned()))
        );
        assert_eq!(Role::from_stored("owner"), Role::Customer);
    }

    #[test]
    fn test_staff() {
        assert!(Role::SeoManager.is_staff());
        assert!(!Role::Customer.is_staff());
        assert!(!Role::STAFF.contains(&Role::Customer));
    }
}
