//! Search-engine plumbing: page meta resolution, JSON-LD, `sitemap.xml`
//! and `robots.txt`.
//!
//! Meta overrides and stored schema markup are looked up per path on every
//! page view, so they are cached with `moka` (5-minute TTL). Dashboard writes
//! call the matching `invalidate_*` method.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::debug;

use handset_core::{Currency, Money};

use crate::config::StorefrontConfig;
use crate::db::{CategoryRepository, PostRepository, ProductRepository, RepositoryError, SeoRepository};
use crate::models::{MetaTag, Post, Product, SchemaMarkup};

// =============================================================================
// Page meta
// =============================================================================

/// The `<head>` data for one rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
    pub canonical_url: Option<String>,
    pub noindex: bool,
    /// Serialized JSON-LD blocks, one `<script type="application/ld+json">` each.
    pub json_ld: Vec<String>,
}

impl PageMeta {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<impl Into<String>>) -> Self {
        self.description = description.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: Option<impl Into<String>>) -> Self {
        self.og_image = image.map(Into::into);
        self
    }

    #[must_use]
    pub const fn noindex(mut self) -> Self {
        self.noindex = true;
        self
    }

    #[must_use]
    pub fn with_json_ld(mut self, value: &Value) -> Self {
        self.json_ld.push(script_safe(value));
        self
    }

    /// Apply a dashboard override. Set fields win; empty ones keep the page's own.
    #[must_use]
    pub fn with_override(mut self, tag: Option<&MetaTag>) -> Self {
        let Some(tag) = tag else {
            return self;
        };
        if let Some(title) = &tag.title {
            self.title.clone_from(title);
        }
        if tag.description.is_some() {
            self.description.clone_from(&tag.description);
        }
        if tag.keywords.is_some() {
            self.keywords.clone_from(&tag.keywords);
        }
        if tag.og_image.is_some() {
            self.og_image.clone_from(&tag.og_image);
        }
        if tag.canonical_url.is_some() {
            self.canonical_url.clone_from(&tag.canonical_url);
        }
        self.noindex |= tag.noindex;
        self
    }

    #[must_use]
    pub fn with_markup(mut self, markup: &[SchemaMarkup]) -> Self {
        self.json_ld
            .extend(markup.iter().map(|m| script_safe(&m.json_ld)));
        self
    }

    /// `Title | Site`, or just the site name for an empty title.
    #[must_use]
    pub fn full_title(&self, site_name: &str) -> String {
        if self.title.is_empty() || self.title == site_name {
            site_name.to_owned()
        } else {
            format!("{} | {site_name}", self.title)
        }
    }
}

/// Serialize for embedding in a `<script>` element: `<` can't close the tag.
fn script_safe(value: &Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

// =============================================================================
// JSON-LD
// =============================================================================

#[must_use]
pub fn organization_json_ld(site_name: &str, base_url: &str) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "Organization",
        "name": site_name,
        "url": base_url,
        "logo": format!("{base_url}/static/images/logo.png"),
    })
}

#[must_use]
pub fn product_json_ld(product: &Product, base_url: &str, currency: Currency) -> Value {
    let url = format!("{base_url}/products/{}", product.slug);
    let availability = if product.in_stock() {
        "https://schema.org/InStock"
    } else {
        "https://schema.org/OutOfStock"
    };

    let mut value = json!({
        "@context": "https://schema.org",
        "@type": "Product",
        "name": product.title,
        "url": url,
        "sku": format!("HS-{}", product.id),
        "offers": {
            "@type": "Offer",
            "url": url,
            "price": product.price.round_dp(2).to_string(),
            "priceCurrency": currency.code(),
            "availability": availability,
        },
    });

    if let Some(description) = &product.meta_description {
        value["description"] = json!(description);
    }
    if let Some(brand) = &product.brand {
        value["brand"] = json!({ "@type": "Brand", "name": brand });
    }
    if let Some(image) = &product.featured_image {
        value["image"] = json!(absolute(base_url, image));
    }
    value
}

#[must_use]
pub fn blog_posting_json_ld(post: &Post, base_url: &str, site_name: &str) -> Value {
    let mut value = json!({
        "@context": "https://schema.org",
        "@type": "BlogPosting",
        "headline": post.title,
        "url": format!("{base_url}/blog/{}", post.slug),
        "dateModified": post.updated_at.to_rfc3339(),
        "publisher": { "@type": "Organization", "name": site_name },
    });
    if let Some(published) = post.published_at {
        value["datePublished"] = json!(published.to_rfc3339());
    }
    if let Some(excerpt) = &post.excerpt {
        value["description"] = json!(excerpt);
    }
    if let Some(image) = &post.cover_image {
        value["image"] = json!(absolute(base_url, image));
    }
    value
}

/// `crumbs` are `(name, site path)` pairs from the root down.
#[must_use]
pub fn breadcrumb_json_ld(crumbs: &[(&str, &str)], base_url: &str) -> Value {
    let items: Vec<Value> = crumbs
        .iter()
        .enumerate()
        .map(|(i, (name, path))| {
            json!({
                "@type": "ListItem",
                "position": i + 1,
                "name": name,
                "item": format!("{base_url}{path}"),
            })
        })
        .collect();

    json!({
        "@context": "https://schema.org",
        "@type": "BreadcrumbList",
        "itemListElement": items,
    })
}

fn absolute(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_owned()
    } else {
        format!("{base_url}/{}", url.trim_start_matches('/'))
    }
}

/// Price text for meta descriptions, e.g. `From $799.00`.
#[must_use]
pub fn price_phrase(product: &Product, currency: Currency) -> String {
    format!("From {}", Money::new(product.price, currency))
}

// =============================================================================
// Sitemap & robots
// =============================================================================

#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub path: String,
    pub lastmod: Option<DateTime<Utc>>,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

impl SitemapEntry {
    fn new(path: impl Into<String>, changefreq: &'static str, priority: &'static str) -> Self {
        Self {
            path: path.into(),
            lastmod: None,
            changefreq,
            priority,
        }
    }

    const fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.lastmod = Some(at);
        self
    }
}

/// Render a `urlset` document. `noindex` paths are left out.
#[must_use]
pub fn render_sitemap(base_url: &str, entries: &[SitemapEntry], noindex: &[String]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries.iter().filter(|e| !noindex.contains(&e.path)) {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}</loc>\n",
            xml_escape(&format!("{base_url}{}", entry.path))
        ));
        if let Some(lastmod) = entry.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod.format("%Y-%m-%d")));
        }
        xml.push_str(&format!("    <changefreq>{}</changefreq>\n", entry.changefreq));
        xml.push_str(&format!("    <priority>{}</priority>\n", entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Private areas that never belong in an index.
const PRIVATE_PREFIXES: &[&str] = &[
    "/dashboard",
    "/account",
    "/auth/",
    "/api/",
    "/cart",
    "/checkout",
    "/favourites",
];

#[must_use]
pub fn render_robots(base_url: &str, noindex: &[String]) -> String {
    let mut txt = String::from("User-agent: *\n");
    for prefix in PRIVATE_PREFIXES {
        txt.push_str(&format!("Disallow: {prefix}\n"));
    }
    for path in noindex {
        txt.push_str(&format!("Disallow: {path}\n"));
    }
    txt.push_str(&format!("\nSitemap: {base_url}/sitemap.xml\n"));
    txt
}

// =============================================================================
// Cached service
// =============================================================================

#[derive(Debug, Clone)]
enum CacheValue {
    Meta(Option<MetaTag>),
    Schema(Vec<SchemaMarkup>),
    Text(Arc<str>),
}

const SITEMAP_KEY: &str = "sitemap";
const ROBOTS_KEY: &str = "robots";

/// Cached SEO lookups shared by every handler.
#[derive(Clone)]
pub struct SeoService {
    cache: Cache<String, CacheValue>,
}

impl Default for SeoService {
    fn default() -> Self {
        Self::new()
    }
}

impl SeoService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(2000)
                .time_to_live(Duration::from_secs(300))
                .build(),
        }
    }

    /// Page meta for `path`: `defaults` with any dashboard override and
    /// stored schema markup applied. Lookup failures keep the defaults.
    pub async fn page_meta(&self, pool: &PgPool, path: &str, defaults: PageMeta) -> PageMeta {
        let tag = self.meta_tag(pool, path).await;
        let markup = self.schema_markup(pool, path).await;
        defaults.with_override(tag.as_ref()).with_markup(&markup)
    }

    async fn meta_tag(&self, pool: &PgPool, path: &str) -> Option<MetaTag> {
        let key = format!("meta:{path}");
        if let Some(CacheValue::Meta(tag)) = self.cache.get(&key).await {
            debug!(path, "Meta cache hit");
            return tag;
        }
        match SeoRepository::new(pool).meta_for_path(path).await {
            Ok(tag) => {
                self.cache.insert(key, CacheValue::Meta(tag.clone())).await;
                tag
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Meta tag lookup failed");
                None
            }
        }
    }

    async fn schema_markup(&self, pool: &PgPool, path: &str) -> Vec<SchemaMarkup> {
        let key = format!("schema:{path}");
        if let Some(CacheValue::Schema(markup)) = self.cache.get(&key).await {
            return markup;
        }
        match SeoRepository::new(pool).schema_for_path(path).await {
            Ok(markup) => {
                self.cache
                    .insert(key, CacheValue::Schema(markup.clone()))
                    .await;
                markup
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Schema markup lookup failed");
                Vec::new()
            }
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the catalog, blog or SEO tables can't be read.
    pub async fn sitemap(
        &self,
        pool: &PgPool,
        config: &StorefrontConfig,
    ) -> Result<Arc<str>, RepositoryError> {
        if let Some(CacheValue::Text(xml)) = self.cache.get(SITEMAP_KEY).await {
            return Ok(xml);
        }

        let mut entries = vec![
            SitemapEntry::new("/", "daily", "1.0"),
            SitemapEntry::new("/products", "daily", "0.9"),
            SitemapEntry::new("/blog", "weekly", "0.6"),
            SitemapEntry::new("/about", "monthly", "0.4"),
            SitemapEntry::new("/contact", "monthly", "0.4"),
        ];
        for slug in CategoryRepository::new(pool).slugs().await? {
            entries.push(SitemapEntry::new(format!("/categories/{slug}"), "weekly", "0.7"));
        }
        for (slug, updated_at) in ProductRepository::new(pool).published_slugs().await? {
            entries.push(
                SitemapEntry::new(format!("/products/{slug}"), "weekly", "0.8").modified(updated_at),
            );
        }
        for (slug, updated_at) in PostRepository::new(pool).published_slugs().await? {
            entries.push(
                SitemapEntry::new(format!("/blog/{slug}"), "monthly", "0.5").modified(updated_at),
            );
        }
        let noindex = SeoRepository::new(pool).noindex_paths().await?;

        let xml: Arc<str> = render_sitemap(&config.base_url, &entries, &noindex).into();
        self.cache
            .insert(SITEMAP_KEY.to_owned(), CacheValue::Text(Arc::clone(&xml)))
            .await;
        debug!(urls = entries.len(), "Sitemap rebuilt");
        Ok(xml)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the noindex paths can't be read.
    pub async fn robots(
        &self,
        pool: &PgPool,
        config: &StorefrontConfig,
    ) -> Result<Arc<str>, RepositoryError> {
        if let Some(CacheValue::Text(txt)) = self.cache.get(ROBOTS_KEY).await {
            return Ok(txt);
        }
        let noindex = SeoRepository::new(pool).noindex_paths().await?;
        let txt: Arc<str> = render_robots(&config.base_url, &noindex).into();
        self.cache
            .insert(ROBOTS_KEY.to_owned(), CacheValue::Text(Arc::clone(&txt)))
            .await;
        Ok(txt)
    }

    /// Drop cached meta and markup for `path`, plus the generated documents.
    pub async fn invalidate_path(&self, path: &str) {
        self.cache.invalidate(&format!("meta:{path}")).await;
        self.cache.invalidate(&format!("schema:{path}")).await;
        self.invalidate_documents().await;
    }

    /// Drop the cached sitemap and robots.txt after catalog or blog changes.
    pub async fn invalidate_documents(&self) {
        self.cache.invalidate(SITEMAP_KEY).await;
        self.cache.invalidate(ROBOTS_KEY).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use handset_core::{MetaTagId, ProductId, ProductStatus, Slug};

    use super::*;

    const BASE: &str = "https://handset.test";

    fn product() -> Product {
        Product {
            id: ProductId::new(7),
            title: "Pixel 9".into(),
            slug: Slug::parse("pixel-9").unwrap(),
            brand: Some("Google".into()),
            category_id: None,
            description: String::new(),
            price: Decimal::new(79_900, 2),
            compare_at_price: None,
            on_sale: false,
            featured_image: Some("/static/images/pixel-9.jpg".into()),
            stock_quantity: 0,
            is_featured: false,
            status: ProductStatus::Published,
            meta_title: None,
            meta_description: Some("Google's latest".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_product_json_ld() {
        let value = product_json_ld(&product(), BASE, Currency::Eur);
        assert_eq!(value["@type"], "Product");
        assert_eq!(value["url"], "https://handset.test/products/pixel-9");
        assert_eq!(value["brand"]["name"], "Google");
        assert_eq!(value["image"], "https://handset.test/static/images/pixel-9.jpg");
        assert_eq!(value["offers"]["price"], "799.00");
        assert_eq!(value["offers"]["priceCurrency"], "EUR");
        assert_eq!(value["offers"]["availability"], "https://schema.org/OutOfStock");
    }

    #[test]
    fn test_breadcrumb_positions() {
        let value = breadcrumb_json_ld(&[("Home", "/"), ("Phones", "/products")], BASE);
        let items = value["itemListElement"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["position"], 1);
        assert_eq!(items[1]["item"], "https://handset.test/products");
    }

    #[test]
    fn test_json_ld_is_script_safe() {
        let meta = PageMeta::new("x").with_json_ld(&json!({ "name": "</script><b>" }));
        assert!(!meta.json_ld[0].contains("</script>"));
    }

    #[test]
    fn test_sitemap_skips_noindex_and_escapes() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let entries = vec![
            SitemapEntry::new("/", "daily", "1.0"),
            SitemapEntry::new("/products/a&b", "weekly", "0.8").modified(at),
            SitemapEntry::new("/about", "monthly", "0.4"),
        ];
        let xml = render_sitemap(BASE, &entries, &["/about".to_owned()]);

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://handset.test/</loc>"));
        assert!(xml.contains("<loc>https://handset.test/products/a&amp;b</loc>"));
        assert!(xml.contains("<lastmod>2026-01-02</lastmod>"));
        assert!(!xml.contains("/about"));
        assert_eq!(xml.matches("<url>").count(), 2);
    }

    #[test]
    fn test_robots() {
        let txt = render_robots(BASE, &["/promo-old".to_owned()]);
        assert!(txt.starts_with("User-agent: *\n"));
        assert!(txt.contains("Disallow: /dashboard\n"));
        assert!(txt.contains("Disallow: /promo-old\n"));
        assert!(txt.ends_with("Sitemap: https://handset.test/sitemap.xml\n"));
    }

    #[test]
    fn test_meta_override() {
        let tag = MetaTag {
            id: MetaTagId::new(1),
            path: "/".into(),
            title: Some("Buy phones".into()),
            description: None,
            keywords: Some("phones".into()),
            og_image: None,
            canonical_url: None,
            noindex: true,
            updated_at: Utc::now(),
        };
        let meta = PageMeta::new("Home")
            .with_description(Some("Our shop"))
            .with_override(Some(&tag));

        assert_eq!(meta.title, "Buy phones");
        assert_eq!(meta.description.as_deref(), Some("Our shop"));
        assert_eq!(meta.keywords.as_deref(), Some("phones"));
        assert!(meta.noindex);
        assert_eq!(meta.full_title("Handset"), "Buy phones | Handset");
        assert_eq!(PageMeta::new("Handset").full_title("Handset"), "Handset");
    }
}
