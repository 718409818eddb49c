//! Product repository (`catalog.product`) and the cart's [`Catalog`] adapter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use handset_core::cart::{Catalog, CatalogError, CatalogProduct};
use handset_core::{CategoryId, ProductId, ProductStatus, Slug};

use super::{RepositoryError, parse_column};
use crate::models::{Paginated, Product, ProductDraft, ProductQuery};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    slug: String,
    brand: Option<String>,
    category_id: Option<i32>,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    on_sale: bool,
    featured_image: Option<String>,
    stock_quantity: i32,
    is_featured: bool,
    status: String,
    meta_title: Option<String>,
    meta_description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            title: row.title,
            slug,
            brand: row.brand,
            category_id: row.category_id.map(CategoryId::new),
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            on_sale: row.on_sale,
            featured_image: row.featured_image,
            stock_quantity: row.stock_quantity,
            is_featured: row.is_featured,
            status: parse_column("product status", &row.status)?,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CatalogRow {
    id: i32,
    title: String,
    slug: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    on_sale: bool,
    featured_image: Option<String>,
}

impl From<CatalogRow> for CatalogProduct {
    fn from(row: CatalogRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            title: row.title,
            slug: row.slug,
            price: row.price,
            compare_at_price: row.compare_at_price,
            on_sale: row.on_sale,
            featured_image: row.featured_image,
        }
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.title, p.slug, p.brand, p.category_id, p.description, \
     p.price, p.compare_at_price, p.on_sale, p.featured_image, p.stock_quantity, p.is_featured, \
     p.status, p.meta_title, p.meta_description, p.created_at, p.updated_at";

/// Shared `WHERE` for published listings. Every filter is optional:
/// `$1` search pattern, `$2` category slug, `$3` brand, `$4` min price, `$5` max price.
const LISTING_FILTER: &str = r"
    FROM catalog.product p
    LEFT JOIN catalog.category c ON c.id = p.category_id
    WHERE p.status = 'published'
      AND ($1::text IS NULL OR p.title ILIKE $1 OR p.brand ILIKE $1 OR p.description ILIKE $1)
      AND ($2::text IS NULL OR c.slug = $2)
      AND ($3::text IS NULL OR LOWER(p.brand) = LOWER($3))
      AND ($4::numeric IS NULL OR p.price >= $4)
      AND ($5::numeric IS NULL OR p.price <= $5)
";

/// Product counts by status for the dashboard overview.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductCounts {
    pub published: i64,
    pub draft: i64,
    pub archived: i64,
    pub low_stock: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Stock at or below this is flagged on the dashboard.
    pub const LOW_STOCK_THRESHOLD: i32 = 5;

    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of published products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_published(
        &self,
        query: &ProductQuery,
    ) -> Result<Paginated<Product>, RepositoryError> {
        let search = query.search_pattern();
        let category = query.category.as_ref().map(Slug::as_str);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {LISTING_FILTER}"))
            .bind(search.as_deref())
            .bind(category)
            .bind(query.brand.as_deref())
            .bind(query.min_price)
            .bind(query.max_price)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} {LISTING_FILTER} ORDER BY {} LIMIT $6 OFFSET $7",
            query.sort.order_by()
        ))
        .bind(search.as_deref())
        .bind(category)
        .bind(query.brand.as_deref())
        .bind(query.min_price)
        .bind(query.max_price)
        .bind(i64::from(ProductQuery::PER_PAGE))
        .bind(query.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paginated {
            items: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            page: query.page,
            per_page: ProductQuery::PER_PAGE,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             WHERE p.slug = $1 AND p.status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Featured published products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             WHERE p.status = 'published' AND p.is_featured \
             ORDER BY p.updated_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Other published products in the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn related(&self, product: &Product, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             WHERE p.status = 'published' AND p.category_id = $1 AND p.id <> $2 \
             ORDER BY p.is_featured DESC, p.created_at DESC LIMIT $3"
        ))
        .bind(category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Published products among `ids`, in `ids` order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn published_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             WHERE p.id = ANY($1) AND p.status = 'published' \
             ORDER BY array_position($1, p.id)"
        ))
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// The cart's batched lookup: `id = ANY($1) AND status = 'published'`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn catalog_entries(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogProduct>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, CatalogRow>(
            r"
            SELECT id, title, slug, price, compare_at_price, on_sale, featured_image
            FROM catalog.product
            WHERE id = ANY($1) AND status = 'published'
            ",
        )
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Distinct brands of published products, for the listing filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn brands(&self) -> Result<Vec<String>, RepositoryError> {
        let brands = sqlx::query_scalar(
            r"
            SELECT DISTINCT brand FROM catalog.product
            WHERE status = 'published' AND brand IS NOT NULL AND brand <> ''
            ORDER BY brand
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(brands)
    }

    /// `(slug, updated_at)` of every published product, for the sitemap.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn published_slugs(&self) -> Result<Vec<(String, DateTime<Utc>)>, RepositoryError> {
        let rows = sqlx::query_as(
            "SELECT slug, updated_at FROM catalog.product WHERE status = 'published' ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Dashboard
    // -------------------------------------------------------------------------

    /// Every product, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(
        &self,
        status: Option<ProductStatus>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p \
             WHERE ($1::text IS NULL OR p.status = $1) \
             ORDER BY p.updated_at DESC, p.id DESC"
        ))
        .bind(status.map(ProductStatus::as_str))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM catalog.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO catalog.product AS p (
                title, slug, brand, category_id, description, price, compare_at_price,
                on_sale, featured_image, stock_quantity, is_featured, status,
                meta_title, meta_description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&draft.title)
        .bind(draft.slug.as_str())
        .bind(draft.brand.as_deref())
        .bind(draft.category_id)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.compare_at_price)
        .bind(draft.on_sale)
        .bind(draft.featured_image.as_deref())
        .bind(draft.stock_quantity)
        .bind(draft.is_featured)
        .bind(draft.status.as_str())
        .bind(draft.meta_title.as_deref())
        .bind(draft.meta_description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::conflict_on_unique("A product with this slug already exists"))?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE catalog.product AS p SET
                title = $2, slug = $3, brand = $4, category_id = $5, description = $6,
                price = $7, compare_at_price = $8, on_sale = $9, featured_image = $10,
                stock_quantity = $11, is_featured = $12, status = $13,
                meta_title = $14, meta_description = $15, updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&draft.title)
        .bind(draft.slug.as_str())
        .bind(draft.brand.as_deref())
        .bind(draft.category_id)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.compare_at_price)
        .bind(draft.on_sale)
        .bind(draft.featured_image.as_deref())
        .bind(draft.stock_quantity)
        .bind(draft.is_featured)
        .bind(draft.status.as_str())
        .bind(draft.meta_title.as_deref())
        .bind(draft.meta_description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::conflict_on_unique("A product with this slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Order items keep their title and price; their `product_id` is nulled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog.product WHERE id = $1")
            .bind(id)
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
    pub async fn counts(&self) -> Result<ProductCounts, RepositoryError> {
        let (published, draft, archived, low_stock): (i64, i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*) FILTER (WHERE status = 'published'),
                COUNT(*) FILTER (WHERE status = 'draft'),
                COUNT(*) FILTER (WHERE status = 'archived'),
                COUNT(*) FILTER (WHERE status = 'published' AND stock_quantity <= $1)
            FROM catalog.product
            ",
        )
        .bind(Self::LOW_STOCK_THRESHOLD)
        .fetch_one(self.pool)
        .await?;

        Ok(ProductCounts {
            published,
            draft,
            archived,
            low_stock,
        })
    }
}

// =============================================================================
// Catalog adapter
// =============================================================================

/// The cart's view of `catalog.product`.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Catalog for PgCatalog {
    async fn published_products(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ProductRepository::new(&self.pool)
            .catalog_entries(ids)
            .await
            .map_err(|e| match e {
                RepositoryError::DataCorruption(msg) => CatalogError::InvalidData(msg),
                other => CatalogError::Unavailable(other.to_string()),
            })
    }
}
