//! Content repositories: pages, posts and contact messages.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use handset_core::{ContactMessageId, Email, PostId, Slug, UserId};

use super::{RepositoryError, parse_column};
use crate::models::{ContactMessage, ContentPage, Post, PostDraft};

fn parse_slug(kind: &str, raw: &str) -> Result<Slug, RepositoryError> {
    Slug::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {kind} slug in database: {e}")))
}

// =============================================================================
// Pages
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PageRow {
    slug: String,
    title: String,
    body_markdown: String,
    meta_description: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PageRow> for ContentPage {
    type Error = RepositoryError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            slug: parse_slug("page", &row.slug)?,
            title: row.title,
            body_markdown: row.body_markdown,
            meta_description: row.meta_description,
            updated_at: Some(row.updated_at),
        })
    }
}

/// Repository for `content.page`.
pub struct PageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get(&self, slug: &str) -> Result<Option<ContentPage>, RepositoryError> {
        let row = sqlx::query_as::<_, PageRow>(
            "SELECT slug, title, body_markdown, meta_description, updated_at FROM content.page WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(&self) -> Result<Vec<ContentPage>, RepositoryError> {
        let rows = sqlx::query_as::<_, PageRow>(
            "SELECT slug, title, body_markdown, meta_description, updated_at FROM content.page ORDER BY slug",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Create or replace a page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        slug: &Slug,
        title: &str,
        body_markdown: &str,
        meta_description: Option<&str>,
    ) -> Result<ContentPage, RepositoryError> {
        let row = sqlx::query_as::<_, PageRow>(
            r"
            INSERT INTO content.page (slug, title, body_markdown, meta_description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO UPDATE SET
                title = EXCLUDED.title,
                body_markdown = EXCLUDED.body_markdown,
                meta_description = EXCLUDED.meta_description,
                updated_at = NOW()
            RETURNING slug, title, body_markdown, meta_description, updated_at
            ",
        )
        .bind(slug.as_str())
        .bind(title)
        .bind(body_markdown)
        .bind(meta_description)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }
}

// =============================================================================
// Posts
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i32,
    title: String,
    slug: String,
    excerpt: Option<String>,
    body_markdown: String,
    cover_image: Option<String>,
    author_id: Option<Uuid>,
    status: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = RepositoryError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PostId::new(row.id),
            title: row.title,
            slug: parse_slug("post", &row.slug)?,
            excerpt: row.excerpt,
            body_markdown: row.body_markdown,
            cover_image: row.cover_image,
            author_id: row.author_id.map(UserId::from_uuid),
            status: parse_column("post status", &row.status)?,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const POST_COLUMNS: &str = "id, title, slug, excerpt, body_markdown, cover_image, author_id, \
     status, published_at, created_at, updated_at";

/// Repository for `content.post`.
pub struct PostRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepository<'a> {
    pub const PER_PAGE: i64 = 10;

    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Published posts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_published(&self, limit: i64, offset: i64) -> Result<Vec<Post>, RepositoryError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM content.post WHERE status = 'published' \
             ORDER BY published_at DESC NULLS LAST, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_published(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM content.post WHERE status = 'published'")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Option<Post>, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM content.post WHERE slug = $1 AND status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn published_slugs(&self) -> Result<Vec<(String, DateTime<Utc>)>, RepositoryError> {
        let rows = sqlx::query_as(
            "SELECT slug, updated_at FROM content.post WHERE status = 'published' ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every post, drafts included, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(&self) -> Result<Vec<Post>, RepositoryError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM content.post ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM content.post WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// `published_at` is stamped the first time a post is published.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, draft: &PostDraft, author: UserId) -> Result<Post, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r"
            INSERT INTO content.post (title, slug, excerpt, body_markdown, cover_image, author_id, status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 = 'published' THEN NOW() END)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(&draft.title)
        .bind(draft.slug.as_str())
        .bind(draft.excerpt.as_deref())
        .bind(&draft.body_markdown)
        .bind(draft.cover_image.as_deref())
        .bind(author)
        .bind(draft.status.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::conflict_on_unique("A post with this slug already exists"))?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post doesn't exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(&self, id: PostId, draft: &PostDraft) -> Result<Post, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r"
            UPDATE content.post SET
                title = $2, slug = $3, excerpt = $4, body_markdown = $5, cover_image = $6,
                status = $7,
                published_at = CASE
                    WHEN $7 = 'published' THEN COALESCE(published_at, NOW())
                    ELSE published_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&draft.title)
        .bind(draft.slug.as_str())
        .bind(draft.excerpt.as_deref())
        .bind(&draft.body_markdown)
        .bind(draft.cover_image.as_deref())
        .bind(draft.status.as_str())
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::conflict_on_unique("A post with this slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: PostId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM content.post WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Contact messages
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i32,
    name: String,
    email: String,
    phone: Option<String>,
    subject: Option<String>,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ContactMessage {
    type Error = RepositoryError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid message email in database: {e}"))
        })?;

        Ok(Self {
            id: ContactMessageId::new(row.id),
            name: row.name,
            email,
            phone: row.phone,
            subject: row.subject,
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

/// Repository for `content.contact_message`.
pub struct MessageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        phone: Option<&str>,
        subject: Option<&str>,
        message: &str,
    ) -> Result<ContactMessageId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO content.contact_message (name, email, phone, subject, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(name)
        .bind(email.as_str())
        .bind(phone)
        .bind(subject)
        .bind(message)
        .fetch_one(self.pool)
        .await?;

        Ok(ContactMessageId::new(id))
    }

    /// Unread first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(&self) -> Result<Vec<ContactMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT id, name, email, phone, subject, message, is_read, created_at
            FROM content.contact_message
            ORDER BY is_read ASC, created_at DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the message doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_read(&self, id: ContactMessageId, is_read: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE content.contact_message SET is_read = $2 WHERE id = $1")
            .bind(id)
            .bind(is_read)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content.contact_message WHERE NOT is_read",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
