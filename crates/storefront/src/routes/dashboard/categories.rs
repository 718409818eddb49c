//! Dashboard category management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};
use validator::Validate;

use handset_core::{CategoryId, Slug};

use crate::db::{CategoryRepository, RepositoryError};
use crate::error::{Result, first_validation_message};
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::Category;
use crate::models::catalog::non_empty;
use crate::state::AppState;
use crate::views::set_flash;

use super::{DashboardLayout, DashboardShell};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: i32,
}

impl CategoryInput {
    fn slug(&self) -> std::result::Result<Slug, String> {
        let explicit = self.slug.trim();
        if explicit.is_empty() {
            Slug::from_title(&self.name).ok_or_else(|| "Name must contain letters or digits".to_owned())
        } else {
            Slug::parse(explicit).map_err(|e| format!("Slug: {e}"))
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/categories.html")]
pub struct CategoriesTemplate {
    pub layout: DashboardLayout,
    pub categories: Vec<Category>,
    pub form: CategoryInput,
    pub error: Option<String>,
}

async fn render(
    state: &AppState,
    shell: DashboardShell,
    form: CategoryInput,
    error: Option<String>,
) -> Result<CategoriesTemplate> {
    Ok(CategoriesTemplate {
        layout: shell.layout(state, "Categories"),
        categories: CategoryRepository::new(state.pool()).list_all().await?,
        form,
        error,
    })
}

/// `GET /dashboard/categories`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ProductsWrite>,
) -> Result<CategoriesTemplate> {
    render(&state, shell, CategoryInput::default(), None).await
}

/// `POST /dashboard/categories`
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ProductsWrite>,
    session: Session,
    Form(form): Form<CategoryInput>,
) -> Result<Response> {
    let slug = match form.validate() {
        Err(errors) => Err(first_validation_message(&errors)),
        Ok(()) => form.slug(),
    };
    let slug = match slug {
        Ok(slug) => slug,
        Err(message) => return Ok(render(&state, shell, form, Some(message)).await?.into_response()),
    };

    let created = CategoryRepository::new(state.pool())
        .create(
            form.name.trim(),
            &slug,
            non_empty(&form.description).as_deref(),
            form.position,
        )
        .await;
    match created {
        Ok(category) => {
            state.seo().invalidate_documents().await;
            info!(slug = %category.slug, "Category created");
            set_flash(&session, format!("Created {}.", category.name)).await;
            Ok(Redirect::to("/dashboard/categories").into_response())
        }
        Err(RepositoryError::Conflict(message)) => {
            Ok(render(&state, shell, form, Some(message)).await?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /dashboard/categories/{id}/delete`. Products in it become uncategorized.
#[instrument(skip(state, _guard, session))]
pub async fn delete(
    State(state): State<AppState>,
    _guard: RequirePermission<can::ProductsWrite>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    CategoryRepository::new(state.pool())
        .delete(CategoryId::new(id))
        .await?;
    state.seo().invalidate_documents().await;
    set_flash(&session, "Category deleted.").await;
    Ok(Redirect::to("/dashboard/categories"))
}
