//! SEO records managed from the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use handset_core::{KeywordId, MetaTagId, SchemaMarkupId};

/// Meta overrides for one site path.
#[derive(Debug, Clone, Serialize)]
pub struct MetaTag {
    pub id: MetaTagId,
    /// Site-local path such as `/products/pixel-9`.
    pub path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
    pub canonical_url: Option<String>,
    pub noindex: bool,
    pub updated_at: DateTime<Utc>,
}

fn validate_site_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') && !path.starts_with("//") && !path.contains(char::is_whitespace) {
        Ok(())
    } else {
        let mut err = ValidationError::new("path");
        err.message = Some("Path must start with / and contain no spaces".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MetaTagInput {
    #[validate(custom(function = "validate_site_path"))]
    pub path: String,
    #[validate(length(max = 70, message = "Title should be at most 70 characters"))]
    #[serde(default)]
    pub title: String,
    #[validate(length(max = 160, message = "Description should be at most 160 characters"))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub og_image: String,
    #[validate(url(message = "Canonical URL must be absolute"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub noindex: Option<String>,
}

/// A tracked search keyword.
#[derive(Debug, Clone, Serialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub keyword: String,
    pub target_path: Option<String>,
    pub search_volume: Option<i32>,
    pub current_rank: Option<i32>,
    pub previous_rank: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl Keyword {
    /// Positions gained since the previous check. Positive means moved up.
    #[must_use]
    pub fn rank_change(&self) -> Option<i32> {
        Some(self.previous_rank? - self.current_rank?)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct KeywordInput {
    #[validate(length(min = 1, max = 200, message = "Keyword is required"))]
    pub keyword: String,
    #[serde(default)]
    pub target_path: String,
    #[serde(default)]
    pub search_volume: String,
    #[serde(default)]
    pub current_rank: String,
}

/// Supported schema.org types for stored markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    Organization,
    Product,
    BlogPosting,
    BreadcrumbList,
    #[serde(rename = "FAQPage")]
    FaqPage,
    LocalBusiness,
}

impl SchemaKind {
    pub const ALL: &[Self] = &[
        Self::Organization,
        Self::Product,
        Self::BlogPosting,
        Self::BreadcrumbList,
        Self::FaqPage,
        Self::LocalBusiness,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Product => "Product",
            Self::BlogPosting => "BlogPosting",
            Self::BreadcrumbList => "BreadcrumbList",
            Self::FaqPage => "FAQPage",
            Self::LocalBusiness => "LocalBusiness",
        }
    }

    #[must_use]
    pub fn from_stored(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == s)
    }
}

/// Hand-authored JSON-LD attached to a path.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaMarkup {
    pub id: SchemaMarkupId,
    pub path: String,
    pub kind: SchemaKind,
    pub json_ld: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchemaInput {
    #[validate(custom(function = "validate_site_path"))]
    pub path: String,
    pub kind: SchemaKind,
    #[validate(length(min = 2, message = "JSON-LD is required"))]
    pub json_ld: String,
}

impl SchemaInput {
    /// Parse the submitted JSON-LD, requiring an object whose `@type` (if
    /// present) matches the chosen kind.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message for invalid JSON or a mismatched `@type`.
    pub fn parsed(&self) -> Result<serde_json::Value, String> {
        let mut value: serde_json::Value =
            serde_json::from_str(&self.json_ld).map_err(|e| format!("Invalid JSON: {e}"))?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| "JSON-LD must be an object".to_owned())?;

        match object.get("@type").and_then(serde_json::Value::as_str) {
            Some(kind) if kind != self.kind.as_str() => {
                return Err(format!(
                    "@type is {kind} but the selected kind is {}",
                    self.kind.as_str()
                ));
            }
            Some(_) => {}
            None => {
                object.insert("@type".into(), self.kind.as_str().into());
            }
        }
        object
            .entry("@context")
            .or_insert_with(|| "https://schema.org".into());
        Ok(value)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn schema(kind: SchemaKind, json: &str) -> SchemaInput {
        SchemaInput {
            path: "/".into(),
            kind,
            json_ld: json.into(),
        }
    }

    #[test]
    fn test_schema_input_fills_type_and_context() {
        let value = schema(SchemaKind::FaqPage, r#"{"mainEntity": []}"#)
            .parsed()
            .unwrap();
        assert_eq!(value["@type"], "FAQPage");
        assert_eq!(value["@context"], "https://schema.org");
    }

    #[test]
    fn test_schema_input_rejects_mismatch_and_non_objects() {
        assert!(schema(SchemaKind::Product, r#"{"@type": "Organization"}"#).parsed().is_err());
        assert!(schema(SchemaKind::Product, "[1, 2]").parsed().is_err());
        assert!(schema(SchemaKind::Product, "{not json").parsed().is_err());
    }

    #[test]
    fn test_meta_input_path_validation() {
        let input = MetaTagInput {
            path: "products".into(),
            title: String::new(),
            description: String::new(),
            keywords: String::new(),
            og_image: String::new(),
            canonical_url: None,
            noindex: None,
        };
        assert!(input.validate().is_err());
        assert!(MetaTagInput { path: "/products".into(), ..input }.validate().is_ok());
    }

    #[test]
    fn test_rank_change() {
        let keyword = Keyword {
            id: KeywordId::new(1),
            keyword: "cheap iphone".into(),
            target_path: None,
            search_volume: None,
            current_rank: Some(4),
            previous_rank: Some(9),
            updated_at: Utc::now(),
        };
        assert_eq!(keyword.rank_change(), Some(5));
        assert_eq!(Keyword { previous_rank: None, ..keyword }.rank_change(), None);
    }
}
