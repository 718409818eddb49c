//! SEO repository: `seo.meta_tag`, `seo.keyword`, `seo.schema_markup`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use handset_core::{KeywordId, MetaTagId, SchemaMarkupId};

use super::RepositoryError;
use crate::models::{Keyword, MetaTag, SchemaKind, SchemaMarkup};

#[derive(Debug, sqlx::FromRow)]
struct MetaTagRow {
    id: i32,
    path: String,
    title: Option<String>,
    description: Option<String>,
    keywords: Option<String>,
    og_image: Option<String>,
    canonical_url: Option<String>,
    noindex: bool,
    updated_at: DateTime<Utc>,
}

impl From<MetaTagRow> for MetaTag {
    fn from(row: MetaTagRow) -> Self {
        Self {
            id: MetaTagId::new(row.id),
            path: row.path,
            title: row.title,
            description: row.description,
            keywords: row.keywords,
            og_image: row.og_image,
            canonical_url: row.canonical_url,
            noindex: row.noindex,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct KeywordRow {
    id: i32,
    keyword: String,
    target_path: Option<String>,
    search_volume: Option<i32>,
    current_rank: Option<i32>,
    previous_rank: Option<i32>,
    updated_at: DateTime<Utc>,
}

impl From<KeywordRow> for Keyword {
    fn from(row: KeywordRow) -> Self {
        Self {
            id: KeywordId::new(row.id),
            keyword: row.keyword,
            target_path: row.target_path,
            search_volume: row.search_volume,
            current_rank: row.current_rank,
            previous_rank: row.previous_rank,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SchemaRow {
    id: i32,
    path: String,
    kind: String,
    json_ld: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<SchemaRow> for SchemaMarkup {
    type Error = RepositoryError;

    fn try_from(row: SchemaRow) -> Result<Self, Self::Error> {
        let kind = SchemaKind::from_stored(&row.kind).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("unknown schema kind in database: {}", row.kind))
        })?;

        Ok(Self {
            id: SchemaMarkupId::new(row.id),
            path: row.path,
            kind,
            json_ld: row.json_ld,
            created_at: row.created_at,
        })
    }
}

/// A meta tag ready to be written.
#[derive(Debug, Clone, Default)]
pub struct MetaTagDraft {
    pub path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
    pub canonical_url: Option<String>,
    pub noindex: bool,
}

const META_COLUMNS: &str =
    "id, path, title, description, keywords, og_image, canonical_url, noindex, updated_at";
const KEYWORD_COLUMNS: &str =
    "id, keyword, target_path, search_volume, current_rank, previous_rank, updated_at";

/// Repository for SEO records.
pub struct SeoRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SeoRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // -------------------------------------------------------------------------
    // Meta tags
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn meta_for_path(&self, path: &str) -> Result<Option<MetaTag>, RepositoryError> {
        let row = sqlx::query_as::<_, MetaTagRow>(&format!(
            "SELECT {META_COLUMNS} FROM seo.meta_tag WHERE path = $1"
        ))
        .bind(path)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_meta(&self) -> Result<Vec<MetaTag>, RepositoryError> {
        let rows = sqlx::query_as::<_, MetaTagRow>(&format!(
            "SELECT {META_COLUMNS} FROM seo.meta_tag ORDER BY path"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Paths flagged `noindex`, for `robots.txt`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn noindex_paths(&self) -> Result<Vec<String>, RepositoryError> {
        let paths = sqlx::query_scalar("SELECT path FROM seo.meta_tag WHERE noindex ORDER BY path")
            .fetch_all(self.pool)
            .await?;
        Ok(paths)
    }

    /// Create or replace the meta tag for `draft.path`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_meta(&self, draft: &MetaTagDraft) -> Result<MetaTag, RepositoryError> {
        let row = sqlx::query_as::<_, MetaTagRow>(&format!(
            r"
            INSERT INTO seo.meta_tag (path, title, description, keywords, og_image, canonical_url, noindex)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (path) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                keywords = EXCLUDED.keywords,
                og_image = EXCLUDED.og_image,
                canonical_url = EXCLUDED.canonical_url,
                noindex = EXCLUDED.noindex,
                updated_at = NOW()
            RETURNING {META_COLUMNS}
            "
        ))
        .bind(&draft.path)
        .bind(draft.title.as_deref())
        .bind(draft.description.as_deref())
        .bind(draft.keywords.as_deref())
        .bind(draft.og_image.as_deref())
        .bind(draft.canonical_url.as_deref())
        .bind(draft.noindex)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Returns the deleted tag's path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the tag doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_meta(&self, id: MetaTagId) -> Result<String, RepositoryError> {
        sqlx::query_scalar("DELETE FROM seo.meta_tag WHERE id = $1 RETURNING path")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    // -------------------------------------------------------------------------
    // Keywords
    // -------------------------------------------------------------------------

    /// Ranked keywords first, best rank first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_keywords(&self) -> Result<Vec<Keyword>, RepositoryError> {
        let rows = sqlx::query_as::<_, KeywordRow>(&format!(
            "SELECT {KEYWORD_COLUMNS} FROM seo.keyword ORDER BY current_rank ASC NULLS LAST, keyword"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the keyword is already tracked.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_keyword(
        &self,
        keyword: &str,
        target_path: Option<&str>,
        search_volume: Option<i32>,
        current_rank: Option<i32>,
    ) -> Result<Keyword, RepositoryError> {
        let row = sqlx::query_as::<_, KeywordRow>(&format!(
            r"
            INSERT INTO seo.keyword (keyword, target_path, search_volume, current_rank)
            VALUES ($1, $2, $3, $4)
            RETURNING {KEYWORD_COLUMNS}
            "
        ))
        .bind(keyword)
        .bind(target_path)
        .bind(search_volume)
        .bind(current_rank)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::conflict_on_unique("This keyword is already tracked"))?;
        Ok(row.into())
    }

    /// Record a new rank; the old one becomes `previous_rank`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the keyword doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_rank(
        &self,
        id: KeywordId,
        rank: Option<i32>,
    ) -> Result<Keyword, RepositoryError> {
        let row = sqlx::query_as::<_, KeywordRow>(&format!(
            r"
            UPDATE seo.keyword
            SET previous_rank = current_rank, current_rank = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {KEYWORD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(rank)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the keyword doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_keyword(&self, id: KeywordId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM seo.keyword WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Schema markup
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_schema(&self) -> Result<Vec<SchemaMarkup>, RepositoryError> {
        let rows = sqlx::query_as::<_, SchemaRow>(
            "SELECT id, path, kind, json_ld, created_at FROM seo.schema_markup ORDER BY path, id",
        )
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn schema_for_path(&self, path: &str) -> Result<Vec<SchemaMarkup>, RepositoryError> {
        let rows = sqlx::query_as::<_, SchemaRow>(
            "SELECT id, path, kind, json_ld, created_at FROM seo.schema_markup WHERE path = $1 ORDER BY id",
        )
        .bind(path)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_schema(
        &self,
        path: &str,
        kind: SchemaKind,
        json_ld: &serde_json::Value,
    ) -> Result<SchemaMarkup, RepositoryError> {
        let row = sqlx::query_as::<_, SchemaRow>(
            r"
            INSERT INTO seo.schema_markup (path, kind, json_ld)
            VALUES ($1, $2, $3)
            RETURNING id, path, kind, json_ld, created_at
            ",
        )
        .bind(path)
        .bind(kind.as_str())
        .bind(json_ld)
        .fetch_one(self.pool)
        .await?;
        row.try_into()
    }

    /// Returns the deleted markup's path.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the markup doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_schema(&self, id: SchemaMarkupId) -> Result<String, RepositoryError> {
        sqlx::query_scalar("DELETE FROM seo.schema_markup WHERE id = $1 RETURNING path")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
