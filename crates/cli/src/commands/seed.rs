//! Seed the catalog and content pages from a YAML file.
//!
//! Rows whose slug already exists are skipped, so the command can be run
//! repeatedly against the same database.
//!
//! ```yaml
//! categories:
//!   - name: Smartphones
//!     slug: smartphones
//! products:
//!   - title: Pixel 9
//!     brand: Google
//!     category: smartphones
//!     price: "799.00"
//!     stock_quantity: 12
//!     status: published
//! pages:
//!   - slug: about
//!     title: About us
//!     body_markdown: "..."
//! ```

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use handset_core::{CategoryId, ProductStatus, Slug};
use handset_storefront::db::{CategoryRepository, PageRepository, ProductRepository, RepositoryError};
use handset_storefront::models::ProductDraft;

use super::{ConnectError, connect};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub pages: Vec<SeedPage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub brand: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub on_sale: bool,
    pub featured_image: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub status: ProductStatus,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

impl SeedProduct {
    fn slug(&self) -> Result<Slug, String> {
        match &self.slug {
            Some(slug) => Slug::parse(slug).map_err(|e| format!("{}: {e}", self.title)),
            None => Slug::from_title(&self.title)
                .ok_or_else(|| format!("{}: title has no characters usable in a slug", self.title)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedPage {
    pub slug: String,
    pub title: String,
    pub body_markdown: String,
    pub meta_description: Option<String>,
}

/// Problems that would make the seed fail part-way, reported up front.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    for category in &seed.categories {
        if let Err(e) = Slug::parse(&category.slug) {
            errors.push(format!("category {}: {e}", category.name));
        }
    }

    for product in &seed.products {
        if let Err(e) = product.slug() {
            errors.push(format!("product {e}"));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("product {}: price must not be negative", product.title));
        }
        if product.stock_quantity < 0 {
            errors.push(format!("product {}: stock must not be negative", product.title));
        }
        if product.on_sale && product.compare_at_price.is_none_or(|c| c <= product.price) {
            errors.push(format!(
                "product {}: on_sale needs a compare_at_price above the price",
                product.title
            ));
        }
        if let Some(category) = &product.category
            && !seed.categories.iter().any(|c| &c.slug == category)
        {
            warn!(product = %product.title, category, "Category not in seed file; expecting it in the database");
        }
    }

    for page in &seed.pages {
        if let Err(e) = Slug::parse(&page.slug) {
            errors.push(format!("page {}: {e}", page.title));
        }
    }

    errors
}

#[derive(Debug, Default)]
struct SeedResult {
    inserted: usize,
    skipped: usize,
}

impl SeedResult {
    fn record<T>(&mut self, what: &str, outcome: Result<T, RepositoryError>) -> Result<Option<T>, RepositoryError> {
        match outcome {
            Ok(value) => {
                self.inserted += 1;
                Ok(Some(value))
            }
            Err(RepositoryError::Conflict(_)) => {
                info!("  skipped {what} (already exists)");
                self.skipped += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Seed from `file_path`.
pub async fn run(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = connect().await?;
    let categories = CategoryRepository::new(&pool);
    let mut result = SeedResult::default();

    for category in &seed.categories {
        let slug = Slug::parse(&category.slug).map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let outcome = categories
            .create(&category.name, &slug, category.description.as_deref(), category.position)
            .await;
        result.record(&category.slug, outcome)?;
    }

    let category_ids: HashMap<String, CategoryId> = categories
        .list_all()
        .await?
        .into_iter()
        .map(|c| (c.slug.to_string(), c.id))
        .collect();

    let products = ProductRepository::new(&pool);
    for product in &seed.products {
        let slug = product.slug().map_err(RepositoryError::DataCorruption)?;
        let category_id = product
            .category
            .as_ref()
            .and_then(|slug| category_ids.get(slug).copied());
        if product.category.is_some() && category_id.is_none() {
            warn!(product = %product.title, "Unknown category, seeding without one");
        }

        let draft = ProductDraft {
            title: product.title.clone(),
            slug,
            brand: product.brand.clone(),
            category_id,
            description: product.description.clone(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            on_sale: product.on_sale,
            featured_image: product.featured_image.clone(),
            stock_quantity: product.stock_quantity,
            is_featured: product.is_featured,
            status: product.status,
            meta_title: product.meta_title.clone(),
            meta_description: product.meta_description.clone(),
        };
        let outcome = products.create(&draft).await;
        result.record(&product.title, outcome)?;
    }

    // Pages are upserted: the file is the source of truth for seeded copy.
    let pages = PageRepository::new(&pool);
    for page in &seed.pages {
        let slug = Slug::parse(&page.slug).map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        pages
            .upsert(&slug, &page.title, &page.body_markdown, page.meta_description.as_deref())
            .await?;
        result.inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Rows written: {}", result.inserted);
    info!("  Rows skipped (already exist): {}", result.skipped);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_seed_file_is_valid() {
        let content = include_str!("../../seed/catalog.yaml");
        let seed: SeedFile = serde_yaml::from_str(content).unwrap();
        assert!(!seed.categories.is_empty());
        assert!(!seed.products.is_empty());
        assert_eq!(validate(&seed), Vec::<String>::new());
    }

    #[test]
    fn test_slug_defaults_to_title() {
        let seed: SeedFile = serde_yaml::from_str(
            "products:\n  - title: Galaxy S25 Ultra\n    price: \"1299.00\"\n",
        )
        .unwrap();
        let product = &seed.products[0];
        assert_eq!(product.slug().unwrap().as_str(), "galaxy-s25-ultra");
        assert_eq!(product.status, ProductStatus::Draft);
    }

    #[test]
    fn test_on_sale_without_higher_compare_at_is_rejected() {
        let seed: SeedFile = serde_yaml::from_str(
            "products:\n  - title: Pixel 9\n    price: \"799.00\"\n    compare_at_price: \"700.00\"\n    on_sale: true\n",
        )
        .unwrap();
        let errors = validate(&seed);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("compare_at_price"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let parsed = serde_yaml::from_str::<SeedFile>("products:\n  - title: X\n    price: \"1\"\n    colour: red\n");
        assert!(parsed.is_err());
    }
}
