//! Catalog route handlers: listing, category pages and product detail.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use tower_sessions::Session;
use tracing::instrument;

use handset_core::{Currency, Slug};

use crate::content::{excerpt, render_markdown};
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::favourites_for;
use crate::models::{Category, Product, ProductQuery, ProductQueryParams, ProductSort};
use crate::services::seo::{PageMeta, breadcrumb_json_ld, price_phrase, product_json_ld};
use crate::state::AppState;
use crate::views::{Layout, PaginationView, ProductCard, Shell};

const RELATED_COUNT: i64 = 4;

/// A `<select>` option.
#[derive(Clone, Debug)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// The listing filter form with the current values filled in.
#[derive(Clone, Debug)]
pub struct FilterView {
    pub q: String,
    pub min_price: String,
    pub max_price: String,
    pub categories: Vec<OptionView>,
    pub brands: Vec<OptionView>,
    pub sorts: Vec<OptionView>,
    /// Hidden when the category is fixed by the URL.
    pub show_category: bool,
}

impl FilterView {
    fn new(query: &ProductQuery, categories: &[Category], brands: &[String]) -> Self {
        let category = query.category.as_ref().map(Slug::as_str);
        Self {
            q: query.search.clone().unwrap_or_default(),
            min_price: query.min_price.map(|p| p.to_string()).unwrap_or_default(),
            max_price: query.max_price.map(|p| p.to_string()).unwrap_or_default(),
            categories: categories
                .iter()
                .map(|c| OptionView {
                    value: c.slug.to_string(),
                    label: c.name.clone(),
                    selected: category == Some(c.slug.as_str()),
                })
                .collect(),
            brands: brands
                .iter()
                .map(|b| OptionView {
                    value: b.clone(),
                    label: b.clone(),
                    selected: query.brand.as_deref().is_some_and(|q| q.eq_ignore_ascii_case(b)),
                })
                .collect(),
            sorts: ProductSort::ALL
                .iter()
                .map(|s| OptionView {
                    value: s.as_str().to_owned(),
                    label: s.label().to_owned(),
                    selected: *s == query.sort,
                })
                .collect(),
            show_category: true,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub heading: String,
    pub intro: Option<String>,
    /// Form target: `/products` or `/categories/{slug}`.
    pub action: String,
    pub products: Vec<ProductCard>,
    pub total: u64,
    pub filters: FilterView,
    pub pagination: PaginationView,
}

/// Product detail display data.
#[derive(Clone, Debug)]
pub struct ProductView {
    pub card: ProductCard,
    pub description_html: String,
    pub category: Option<OptionView>,
    /// "Only 3 left" style hint for low stock.
    pub stock_note: Option<String>,
}

impl ProductView {
    fn new(product: &Product, currency: Currency, favourite: bool, category: Option<&Category>) -> Self {
        let stock_note = match product.stock_quantity {
            n if n <= 0 => Some("Out of stock".to_owned()),
            n if n <= ProductRepository::LOW_STOCK_THRESHOLD => Some(format!("Only {n} left")),
            _ => None,
        };
        Self {
            card: ProductCard::new(product, currency, favourite),
            description_html: render_markdown(&product.description),
            category: category.map(|c| OptionView {
                value: c.slug.to_string(),
                label: c.name.clone(),
                selected: true,
            }),
            stock_note,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductView,
    pub related: Vec<ProductCard>,
}

async fn listing(
    state: &AppState,
    session: &Session,
    query: &ProductQuery,
) -> Result<(Vec<ProductCard>, u64, PaginationView, Vec<Category>, Vec<String>)> {
    let products = ProductRepository::new(state.pool());
    let page = products.list_published(query).await?;
    let categories = CategoryRepository::new(state.pool()).list_all().await?;
    let brands = products.brands().await?;
    let favourites = favourites_for(session).ids().await;

    let pagination = PaginationView::new(&page, |p| query.href_for_page(p));
    let cards = ProductCard::list(&page.items, state.config().currency, &favourites);
    Ok((cards, page.total, pagination, categories, brands))
}

/// `GET /products?q=&category=&brand=&min_price=&max_price=&sort=&page=`
#[instrument(skip(state, shell, session))]
pub async fn index(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
    Query(params): Query<ProductQueryParams>,
) -> Result<ProductsIndexTemplate> {
    let query = ProductQuery::from_params(&params);
    let (products, total, pagination, categories, brands) =
        listing(&state, &session, &query).await?;

    let heading = query
        .search
        .as_ref()
        .map_or_else(|| "All phones".to_owned(), |q| format!("Results for “{q}”"));
    // Filtered and paged variants are not separate pages for search engines.
    let mut meta = PageMeta::new("Shop phones")
        .with_description(Some("Browse the latest smartphones and accessories."));
    if query != ProductQuery::from_params(&ProductQueryParams::default()) {
        meta = meta.noindex();
    }

    Ok(ProductsIndexTemplate {
        layout: shell.layout(&state, meta).await,
        heading,
        intro: None,
        action: "/products".to_owned(),
        products,
        total,
        filters: FilterView::new(&query, &categories, &brands),
        pagination,
    })
}

/// `GET /categories/{slug}`: the listing with the category fixed.
#[instrument(skip(state, shell, session, params))]
pub async fn category(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
    Path(slug): Path<String>,
    Query(params): Query<ProductQueryParams>,
) -> Result<ProductsIndexTemplate> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?;

    let mut query = ProductQuery::from_params(&params);
    query.category = Some(category.slug.clone());
    let (products, total, pagination, categories, brands) =
        listing(&state, &session, &query).await?;

    let path = format!("/categories/{}", category.slug);
    let meta = PageMeta::new(&category.name)
        .with_description(category.description.clone())
        .with_json_ld(&breadcrumb_json_ld(
            &[("Home", "/"), ("Phones", "/products"), (category.name.as_str(), path.as_str())],
            &state.config().base_url,
        ));

    let mut filters = FilterView::new(&query, &categories, &brands);
    filters.show_category = false;

    Ok(ProductsIndexTemplate {
        layout: shell.layout(&state, meta).await,
        heading: category.name.clone(),
        intro: category.description.clone(),
        action: path,
        products,
        total,
        filters,
        pagination,
    })
}

/// `GET /products/{slug}`. Drafts and archived products are not found.
#[instrument(skip(state, shell, session))]
pub async fn show(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
    Path(slug): Path<String>,
) -> Result<ProductShowTemplate> {
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get_published_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let related = repo.related(&product, RELATED_COUNT).await?;
    let categories = CategoryRepository::new(state.pool()).list_all().await?;
    let category = categories
        .iter()
        .find(|c| Some(c.id) == product.category_id);
    let favourites = favourites_for(&session).ids().await;

    let config = state.config();
    let path = format!("/products/{}", product.slug);
    let mut crumbs = vec![("Home", "/"), ("Phones", "/products")];
    let category_path = category.map(|c| format!("/categories/{}", c.slug));
    if let (Some(c), Some(p)) = (category, category_path.as_deref()) {
        crumbs.push((c.name.as_str(), p));
    }
    crumbs.push((product.title.as_str(), path.as_str()));

    let description = product.meta_description.clone().unwrap_or_else(|| {
        format!(
            "{} {}",
            price_phrase(&product, config.currency),
            excerpt(&product.description, 120)
        )
    });
    let meta = PageMeta::new(product.seo_title())
        .with_description(Some(description))
        .with_image(product.featured_image.clone())
        .with_json_ld(&product_json_ld(&product, &config.base_url, config.currency))
        .with_json_ld(&breadcrumb_json_ld(&crumbs, &config.base_url));

    Ok(ProductShowTemplate {
        layout: shell.layout(&state, meta).await,
        product: ProductView::new(
            &product,
            config.currency,
            favourites.contains(&product.id),
            category,
        ),
        related: ProductCard::list(&related, config.currency, &favourites),
    })
}

