//! Dashboard product management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use handset_core::session::Permission;
use handset_core::{Currency, ProductId, ProductStatus};

use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::{Category, Product, ProductDraft, ProductInput};
use crate::state::AppState;
use crate::views::{money, set_flash, short_date};

use super::{DashboardLayout, DashboardShell, SelectOption};

/// Product list row.
#[derive(Clone, Debug)]
pub struct ProductRowView {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub brand: String,
    pub price: String,
    pub stock_quantity: i32,
    pub low_stock: bool,
    pub status: &'static str,
    pub is_published: bool,
    pub is_featured: bool,
    pub updated_on: String,
}

impl ProductRowView {
    fn new(product: &Product, currency: Currency) -> Self {
        Self {
            id: product.id.get(),
            slug: product.slug.to_string(),
            title: product.title.clone(),
            brand: product.brand.clone().unwrap_or_default(),
            price: money(product.price, currency),
            stock_quantity: product.stock_quantity,
            low_stock: product.stock_quantity <= ProductRepository::LOW_STOCK_THRESHOLD,
            status: product.status.as_str(),
            is_published: product.is_published(),
            is_featured: product.is_featured,
            updated_on: short_date(&product.updated_at),
        }
    }
}

/// Values shown in the product form.
#[derive(Clone, Debug, Default)]
pub struct ProductFormView {
    pub title: String,
    pub slug: String,
    pub brand: String,
    pub description: String,
    pub price: String,
    pub compare_at_price: String,
    pub on_sale: bool,
    pub featured_image: String,
    pub stock_quantity: String,
    pub is_featured: bool,
    pub meta_title: String,
    pub meta_description: String,
    pub categories: Vec<SelectOption>,
    pub statuses: Vec<SelectOption>,
}

impl ProductFormView {
    fn options(
        mut self,
        categories: &[Category],
        category_id: Option<i32>,
        status: ProductStatus,
    ) -> Self {
        self.categories = categories
            .iter()
            .map(|c| {
                SelectOption::new(c.id.to_string(), c.name.clone(), Some(c.id.get()) == category_id)
            })
            .collect();
        self.statuses = ProductStatus::ALL
            .iter()
            .map(|s| SelectOption::new(s.as_str(), s.as_str(), *s == status))
            .collect();
        self
    }

    fn blank(categories: &[Category]) -> Self {
        Self {
            stock_quantity: "0".to_owned(),
            ..Self::default()
        }
        .options(categories, None, ProductStatus::Draft)
    }

    fn from_product(product: &Product, categories: &[Category]) -> Self {
        Self {
            title: product.title.clone(),
            slug: product.slug.to_string(),
            brand: product.brand.clone().unwrap_or_default(),
            description: product.description.clone(),
            price: product.price.to_string(),
            compare_at_price: product
                .compare_at_price
                .map(|p| p.to_string())
                .unwrap_or_default(),
            on_sale: product.on_sale,
            featured_image: product.featured_image.clone().unwrap_or_default(),
            stock_quantity: product.stock_quantity.to_string(),
            is_featured: product.is_featured,
            meta_title: product.meta_title.clone().unwrap_or_default(),
            meta_description: product.meta_description.clone().unwrap_or_default(),
            ..Self::default()
        }
        .options(
            categories,
            product.category_id.map(|id| id.get()),
            product.status,
        )
    }

    fn from_input(input: &ProductInput, categories: &[Category]) -> Self {
        Self {
            title: input.title.clone(),
            slug: input.slug.clone(),
            brand: input.brand.clone(),
            description: input.description.clone(),
            price: input.price.to_string(),
            compare_at_price: input.compare_at_price.clone(),
            on_sale: input.on_sale(),
            featured_image: input.featured_image.clone(),
            stock_quantity: input.stock_quantity.to_string(),
            is_featured: input.is_featured(),
            meta_title: input.meta_title.clone(),
            meta_description: input.meta_description.clone(),
            ..Self::default()
        }
        .options(
            categories,
            input.category_id().map(|id| id.get()),
            input.status,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub status: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: DashboardLayout,
    pub products: Vec<ProductRowView>,
    pub statuses: Vec<SelectOption>,
    pub can_write: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/products/form.html")]
pub struct ProductFormTemplate {
    pub layout: DashboardLayout,
    /// `/dashboard/products` or `/dashboard/products/{id}`.
    pub action: String,
    pub product_id: Option<i32>,
    pub form: ProductFormView,
    pub error: Option<String>,
}

/// `GET /dashboard/products?status=`
#[instrument(skip(state, shell, profile))]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequirePermission(profile, _): RequirePermission<can::ProductsRead>,
    Query(filter): Query<ProductFilter>,
) -> Result<ProductsIndexTemplate> {
    let status = filter
        .status
        .as_deref()
        .and_then(|s| s.parse::<ProductStatus>().ok());
    let products = ProductRepository::new(state.pool()).list_all(status).await?;
    let currency = state.config().currency;
    let can_write = state
        .permissions()
        .allows(profile.role, Permission::ProductsWrite);

    Ok(ProductsIndexTemplate {
        layout: shell.layout(&state, "Products"),
        products: products.iter().map(|p| ProductRowView::new(p, currency)).collect(),
        statuses: ProductStatus::ALL
            .iter()
            .map(|s| SelectOption::new(s.as_str(), s.as_str(), Some(*s) == status))
            .collect(),
        can_write,
    })
}

/// `GET /dashboard/products/new`
#[instrument(skip_all)]
pub async fn new(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ProductsWrite>,
) -> Result<ProductFormTemplate> {
    let categories = CategoryRepository::new(state.pool()).list_all().await?;
    Ok(ProductFormTemplate {
        layout: shell.layout(&state, "New product"),
        action: "/dashboard/products".to_owned(),
        product_id: None,
        form: ProductFormView::blank(&categories),
        error: None,
    })
}

/// Re-render the form with `error`.
async fn invalid(
    state: &AppState,
    shell: DashboardShell,
    product_id: Option<i32>,
    input: &ProductInput,
    error: String,
) -> Result<Response> {
    let categories = CategoryRepository::new(state.pool()).list_all().await?;
    let (title, action) = match product_id {
        Some(id) => ("Edit product", format!("/dashboard/products/{id}")),
        None => ("New product", "/dashboard/products".to_owned()),
    };
    Ok(ProductFormTemplate {
        layout: shell.layout(state, title),
        action,
        product_id,
        form: ProductFormView::from_input(input, &categories),
        error: Some(error),
    }
    .into_response())
}

async fn after_write(state: &AppState, product: &Product) {
    state
        .seo()
        .invalidate_path(&format!("/products/{}", product.slug))
        .await;
}

/// `POST /dashboard/products`
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ProductsWrite>,
    session: Session,
    Form(input): Form<ProductInput>,
) -> Result<Response> {
    let draft = match ProductDraft::try_from(input.clone()) {
        Ok(draft) => draft,
        Err(message) => return invalid(&state, shell, None, &input, message).await,
    };

    match ProductRepository::new(state.pool()).create(&draft).await {
        Ok(product) => {
            after_write(&state, &product).await;
            info!(product_id = %product.id, slug = %product.slug, "Product created");
            set_flash(&session, format!("Created {}.", product.title)).await;
            Ok(Redirect::to(&format!("/dashboard/products/{}/edit", product.id)).into_response())
        }
        Err(RepositoryError::Conflict(message)) => {
            invalid(&state, shell, None, &input, message).await
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /dashboard/products/{id}/edit`
#[instrument(skip(state, shell, _guard))]
pub async fn edit(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ProductsWrite>,
    Path(id): Path<i32>,
) -> Result<ProductFormTemplate> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    let categories = CategoryRepository::new(state.pool()).list_all().await?;

    Ok(ProductFormTemplate {
        layout: shell.layout(&state, format!("Edit {}", product.title)),
        action: format!("/dashboard/products/{id}"),
        product_id: Some(id),
        form: ProductFormView::from_product(&product, &categories),
        error: None,
    })
}

/// `POST /dashboard/products/{id}`
#[instrument(skip(state, shell, _guard, session, input))]
pub async fn update(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ProductsWrite>,
    session: Session,
    Path(id): Path<i32>,
    Form(input): Form<ProductInput>,
) -> Result<Response> {
    let draft = match ProductDraft::try_from(input.clone()) {
        Ok(draft) => draft,
        Err(message) => return invalid(&state, shell, Some(id), &input, message).await,
    };

    let repo = ProductRepository::new(state.pool());
    let previous_slug = repo.get_by_id(ProductId::new(id)).await?.map(|p| p.slug);
    match repo.update(ProductId::new(id), &draft).await {
        Ok(product) => {
            if let Some(old) = previous_slug.filter(|old| *old != product.slug) {
                state.seo().invalidate_path(&format!("/products/{old}")).await;
            }
            after_write(&state, &product).await;
            info!(product_id = %product.id, "Product updated");
            set_flash(&session, format!("Saved {}.", product.title)).await;
            Ok(Redirect::to(&format!("/dashboard/products/{id}/edit")).into_response())
        }
        Err(RepositoryError::Conflict(message)) => {
            invalid(&state, shell, Some(id), &input, message).await
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /dashboard/products/{id}/delete`
///
/// Past orders keep their lines; the item's product link is cleared.
#[instrument(skip(state, _guard, session))]
pub async fn delete(
    State(state): State<AppState>,
    _guard: RequirePermission<can::ProductsWrite>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;
    state.seo().invalidate_documents().await;
    info!(product_id = id, "Product deleted");
    set_flash(&session, "Product deleted.").await;
    Ok(Redirect::to("/dashboard/products"))
}
