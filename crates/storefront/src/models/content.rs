//! Content pages, blog posts and contact messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use handset_core::{ContactMessageId, Email, PostId, PostStatus, Slug, UserId};

use super::catalog::non_empty;

/// Editable copy for `home`, `about`, `contact` and other static pages.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPage {
    pub slug: Slug,
    pub title: String,
    pub body_markdown: String,
    pub meta_description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: Slug,
    pub excerpt: Option<String>,
    pub body_markdown: String,
    pub cover_image: Option<String>,
    pub author_id: Option<UserId>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Dashboard post form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[validate(length(max = 500, message = "Excerpt must be at most 500 characters"))]
    #[serde(default)]
    pub excerpt: String,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body_markdown: String,
    #[serde(default)]
    pub cover_image: String,
    pub status: PostStatus,
}

impl PostInput {
    /// # Errors
    ///
    /// Returns a user-facing message when no valid slug can be produced.
    pub fn resolved_slug(&self) -> Result<Slug, String> {
        let explicit = self.slug.trim();
        if explicit.is_empty() {
            Slug::from_title(&self.title)
                .ok_or_else(|| "Title must contain letters or digits".to_owned())
        } else {
            Slug::parse(explicit).map_err(|e| format!("Slug: {e}"))
        }
    }
}

/// A validated post ready to be written.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub slug: Slug,
    pub excerpt: Option<String>,
    pub body_markdown: String,
    pub cover_image: Option<String>,
    pub status: PostStatus,
}

impl TryFrom<PostInput> for PostDraft {
    type Error = String;

    fn try_from(input: PostInput) -> Result<Self, Self::Error> {
        input
            .validate()
            .map_err(|e| crate::error::first_validation_message(&e))?;
        Ok(Self {
            slug: input.resolved_slug()?,
            title: input.title.trim().to_owned(),
            excerpt: non_empty(&input.excerpt),
            body_markdown: input.body_markdown,
            cover_image: non_empty(&input.cover_image),
            status: input.status,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Public contact form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewContactMessage {
    #[validate(length(min = 1, max = 120, message = "Please tell us your name"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(max = 40, message = "Phone number is too long"))]
    #[serde(default)]
    pub phone: String,
    #[validate(length(max = 200, message = "Subject is too long"))]
    #[serde(default)]
    pub subject: String,
    #[validate(length(min = 10, max = 5000, message = "Message must be 10 to 5000 characters"))]
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_form_validation() {
        let ok = NewContactMessage {
            name: "Sam".into(),
            email: "sam@example.com".into(),
            phone: String::new(),
            subject: "Trade-in".into(),
            message: "Do you accept trade-ins?".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = NewContactMessage {
            email: "not-an-email".into(),
            message: "short".into(),
            ..ok
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("message"));
    }

    #[test]
    fn test_post_slug_from_title() {
        let input = PostInput {
            title: "Best Phones of 2026!".into(),
            slug: String::new(),
            excerpt: String::new(),
            body_markdown: "Body".into(),
            cover_image: String::new(),
            status: PostStatus::Draft,
        };
        assert_eq!(input.resolved_slug().unwrap().as_str(), "best-phones-of-2026");
    }
}
