//! URL slugs for products, categories, posts and pages.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and single hyphens")]
    InvalidCharacters,
}

/// A lowercase, hyphen-separated path segment such as `iphone-15-pro`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub const MAX_LENGTH: usize = 120;

    /// Validate an already-slugified string.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError`] for empty, overlong or non-canonical input.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let canonical = s.split('-').all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });
        if !canonical {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// Build a slug from free text, e.g. a product title.
    ///
    /// Non-alphanumeric runs collapse to one hyphen. Returns `None` when the
    /// title has no ASCII letters or digits at all.
    #[must_use]
    pub fn from_title(title: &str) -> Option<Self> {
        let mut out = String::with_capacity(title.len());
        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
        while out.ends_with('-') {
            out.pop();
        }
        out.truncate(Self::MAX_LENGTH);
        while out.ends_with('-') {
            out.pop();
        }
        (!out.is_empty()).then_some(Self(out))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_title() {
        assert_eq!(
            Slug::from_title("iPhone 15 Pro Max (256GB)").unwrap().as_str(),
            "iphone-15-pro-max-256gb"
        );
        assert_eq!(
            Slug::from_title("  --Galaxy--S24--  ").unwrap().as_str(),
            "galaxy-s24"
        );
        assert!(Slug::from_title("!!!").is_none());
    }

    #[test]
    fn test_parse() {
        assert!(Slug::parse("pixel-8").is_ok());
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Pixel-8"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("pixel--8"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("-pixel"), Err(SlugError::InvalidCharacters));
    }
}
