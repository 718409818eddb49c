//! Products, categories and catalog listing queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use handset_core::cart::CatalogProduct;
use handset_core::{CategoryId, ProductId, ProductStatus, Slug};

/// A `catalog.product` row.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub slug: Slug,
    pub brand: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Markdown.
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub on_sale: bool,
    pub featured_image: Option<String>,
    pub stock_quantity: i32,
    pub is_featured: bool,
    pub status: ProductStatus,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The slice of this product the cart works with.
    #[must_use]
    pub fn catalog_entry(&self) -> CatalogProduct {
        CatalogProduct {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.to_string(),
            price: self.price,
            compare_at_price: self.compare_at_price,
            on_sale: self.on_sale,
            featured_image: self.featured_image.clone(),
        }
    }

    /// `true` when the product shows a struck-through compare-at price.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.catalog_entry().pricing().1.is_some()
    }

    /// Whole-percent discount off the compare-at price, if discounted.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u32> {
        use rust_decimal::prelude::ToPrimitive;

        let compare_at = self.compare_at_price.filter(|_| self.is_discounted())?;
        ((compare_at - self.price) / compare_at * Decimal::ONE_HUNDRED)
            .round()
            .to_u32()
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == ProductStatus::Published
    }

    /// Page title, falling back to the product title.
    #[must_use]
    pub fn seo_title(&self) -> &str {
        self.meta_title.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub position: i32,
}

/// Listing sort order. Unknown values fall back to [`ProductSort::Newest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Featured,
}

impl ProductSort {
    pub const ALL: &[Self] = &[
        Self::Newest,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::Name,
        Self::Featured,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
            Self::Featured => "featured",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Name => "Name",
            Self::Featured => "Featured",
        }
    }

    /// `ORDER BY` clause. Always ends with `id` so pages are stable.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.title ASC, p.id ASC",
            Self::Featured => "p.is_featured DESC, p.created_at DESC, p.id DESC",
        }
    }

    fn parse(s: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|sort| sort.as_str() == s)
            .unwrap_or_default()
    }
}

/// Raw `/products` query string. Every field is optional text so a bad value
/// degrades to "no filter" instead of a 400.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQueryParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

/// A parsed catalog listing request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<Slug>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    /// 1-based.
    pub page: u32,
}

impl ProductQuery {
    pub const PER_PAGE: u32 = 12;
    const MAX_SEARCH_LEN: usize = 100;

    #[must_use]
    pub fn from_params(params: &ProductQueryParams) -> Self {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
        };
        let price = |value: &Option<String>| {
            text(value)
                .and_then(|s| s.parse::<Decimal>().ok())
                .filter(|d| !d.is_sign_negative())
        };

        let mut min_price = price(&params.min_price);
        let mut max_price = price(&params.max_price);
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            (min_price, max_price) = (Some(max), Some(min));
        }

        Self {
            search: text(&params.q).map(|s| s.chars().take(Self::MAX_SEARCH_LEN).collect()),
            category: text(&params.category).and_then(|s| Slug::parse(&s).ok()),
            brand: text(&params.brand),
            min_price,
            max_price,
            sort: text(&params.sort).map_or_else(ProductSort::default, |s| ProductSort::parse(&s)),
            page: text(&params.page)
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|&p| p > 0)
                .unwrap_or(1),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * Self::PER_PAGE as i64
    }

    /// `ILIKE` pattern for the search term with wildcards escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }

    /// Query string for the same listing on another page.
    #[must_use]
    pub fn href_for_page(&self, page: u32) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(q) = &self.search {
            pairs.push(("q", q.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.to_string()));
        }
        if let Some(brand) = &self.brand {
            pairs.push(("brand", brand.clone()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("min_price", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("max_price", max.to_string()));
        }
        if self.sort != ProductSort::default() {
            pairs.push(("sort", self.sort.as_str().to_owned()));
        }
        pairs.push(("page", page.to_string()));

        let query = pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{query}")
    }
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

fn validate_not_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("Prices cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Dashboard product form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    /// Derived from the title when blank.
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub brand: String,
    /// Blank for "no category".
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "validate_not_negative"))]
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: String,
    #[serde(default)]
    pub on_sale: Option<String>,
    #[serde(default)]
    pub featured_image: String,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub is_featured: Option<String>,
    pub status: ProductStatus,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
}

impl ProductInput {
    /// The slug to store: the explicit one if given, else one derived from the title.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message when neither yields a valid slug.
    pub fn resolved_slug(&self) -> Result<Slug, String> {
        let explicit = self.slug.trim();
        if explicit.is_empty() {
            Slug::from_title(&self.title).ok_or_else(|| "Title must contain letters or digits".to_owned())
        } else {
            Slug::parse(explicit).map_err(|e| format!("Slug: {e}"))
        }
    }

    #[must_use]
    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id.trim().parse().ok()
    }

    /// # Errors
    ///
    /// Returns a user-facing message for a non-numeric or negative price.
    pub fn compare_at_price(&self) -> Result<Option<Decimal>, String> {
        let Some(raw) = non_empty(&self.compare_at_price) else {
            return Ok(None);
        };
        match raw.parse::<Decimal>() {
            Ok(price) if !price.is_sign_negative() => Ok(Some(price)),
            _ => Err("Compare-at price must be a positive number".to_owned()),
        }
    }

    #[must_use]
    pub fn on_sale(&self) -> bool {
        self.on_sale.is_some()
    }

    #[must_use]
    pub fn is_featured(&self) -> bool {
        self.is_featured.is_some()
    }
}

/// A validated product ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub title: String,
    pub slug: Slug,
    pub brand: Option<String>,
    pub category_id: Option<CategoryId>,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub on_sale: bool,
    pub featured_image: Option<String>,
    pub stock_quantity: i32,
    pub is_featured: bool,
    pub status: ProductStatus,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

impl TryFrom<ProductInput> for ProductDraft {
    type Error = String;

    fn try_from(input: ProductInput) -> Result<Self, Self::Error> {
        input
            .validate()
            .map_err(|e| crate::error::first_validation_message(&e))?;
        Ok(Self {
            slug: input.resolved_slug()?,
            compare_at_price: input.compare_at_price()?,
            category_id: input.category_id(),
            on_sale: input.on_sale(),
            is_featured: input.is_featured(),
            title: input.title.trim().to_owned(),
            brand: non_empty(&input.brand),
            description: input.description,
            price: input.price,
            featured_image: non_empty(&input.featured_image),
            stock_quantity: input.stock_quantity,
            status: input.status,
            meta_title: non_empty(&input.meta_title),
            meta_description: non_empty(&input.meta_description),
        })
    }
}

/// Empty strings from HTML forms mean "not set".
#[must_use]
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ProductQueryParams {
        let mut p = ProductQueryParams::default();
        for (k, v) in pairs {
            let v = Some((*v).to_owned());
            match *k {
                "q" => p.q = v,
                "category" => p.category = v,
                "brand" => p.brand = v,
                "min_price" => p.min_price = v,
                "max_price" => p.max_price = v,
                "sort" => p.sort = v,
                "page" => p.page = v,
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn test_empty_query_defaults() {
        let q = ProductQuery::from_params(&ProductQueryParams::default());
        assert_eq!(q, ProductQuery { page: 1, ..ProductQuery::default() });
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn test_query_parses_filters() {
        let q = ProductQuery::from_params(&params(&[
            ("q", "  pixel "),
            ("category", "smartphones"),
            ("brand", "Google"),
            ("min_price", "199.99"),
            ("max_price", "999"),
            ("sort", "price_desc"),
            ("page", "3"),
        ]));
        assert_eq!(q.search.as_deref(), Some("pixel"));
        assert_eq!(q.category.as_ref().unwrap().as_str(), "smartphones");
        assert_eq!(q.brand.as_deref(), Some("Google"));
        assert_eq!(q.min_price, Some(Decimal::new(19_999, 2)));
        assert_eq!(q.max_price, Some(Decimal::new(999, 0)));
        assert_eq!(q.sort, ProductSort::PriceDesc);
        assert_eq!(q.offset(), 24);
    }

    #[test]
    fn test_bad_values_degrade_to_defaults() {
        let q = ProductQuery::from_params(&params(&[
            ("category", "Not A Slug"),
            ("min_price", "cheap"),
            ("max_price", "-5"),
            ("sort", "random"),
            ("page", "0"),
            ("q", "   "),
        ]));
        assert_eq!(q.category, None);
        assert_eq!(q.min_price, None);
        assert_eq!(q.max_price, None);
        assert_eq!(q.sort, ProductSort::Newest);
        assert_eq!(q.page, 1);
        assert_eq!(q.search, None);
    }

    #[test]
    fn test_inverted_price_range_is_swapped() {
        let q = ProductQuery::from_params(&params(&[("min_price", "900"), ("max_price", "100")]));
        assert_eq!(q.min_price, Some(Decimal::new(100, 0)));
        assert_eq!(q.max_price, Some(Decimal::new(900, 0)));
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let q = ProductQuery::from_params(&params(&[("q", "100%_off")]));
        assert_eq!(q.search_pattern().unwrap(), "%100\\%\\_off%");
    }

    #[test]
    fn test_href_for_page_keeps_filters() {
        let q = ProductQuery::from_params(&params(&[("q", "galaxy s24"), ("sort", "name")]));
        assert_eq!(q.href_for_page(2), "?q=galaxy%20s24&sort=name&page=2");
    }

    #[test]
    fn test_pagination_math() {
        let page = Paginated::<()> { items: vec![], page: 2, per_page: 12, total: 25 };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_prev());
        assert!(page.has_next());

        let empty = Paginated::<()> { items: vec![], page: 1, per_page: 12, total: 0 };
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_product_input_slug() {
        let input = ProductInput {
            title: "iPhone 15 Pro (256 GB)".into(),
            slug: String::new(),
            brand: String::new(),
            category_id: String::new(),
            description: String::new(),
            price: Decimal::new(999, 0),
            compare_at_price: "1099".into(),
            on_sale: None,
            featured_image: String::new(),
            stock_quantity: 1,
            is_featured: None,
            status: ProductStatus::Draft,
            meta_title: String::new(),
            meta_description: String::new(),
        };
        assert_eq!(input.resolved_slug().unwrap().as_str(), "iphone-15-pro-256-gb");
        assert_eq!(input.compare_at_price(), Ok(Some(Decimal::new(1099, 0))));
        assert_eq!(input.category_id(), None);

        let bad = ProductInput { slug: "Bad Slug".into(), ..input.clone() };
        assert!(bad.resolved_slug().is_err());

        let bad_compare = ProductInput { compare_at_price: "lots".into(), ..input.clone() };
        assert!(bad_compare.compare_at_price().is_err());

        let negative = ProductInput { price: Decimal::new(-1, 0), ..input.clone() };
        assert!(negative.validate().is_err());
        assert_eq!(
            ProductDraft::try_from(negative).unwrap_err(),
            "Prices cannot be negative"
        );

        let draft = ProductDraft::try_from(input).unwrap();
        assert_eq!(draft.brand, None);
        assert!(!draft.on_sale);
    }
}
