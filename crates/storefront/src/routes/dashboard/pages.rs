//! Dashboard content page editing.
//!
//! The storefront serves `home`, `about` and `contact`. A saved page
//! overrides the markdown file shipped in `content/pages`.

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

use handset_core::Slug;

use crate::db::PageRepository;
use crate::error::{AppError, Result, first_validation_message};
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::catalog::non_empty;
use crate::routes::pages::load_page;
use crate::state::AppState;
use crate::views::{date_time, set_flash};

use super::{DashboardLayout, DashboardShell};

/// Pages the storefront routes to, and where each is served.
pub const EDITABLE_PAGES: &[(&str, &str)] = &[("home", "/"), ("about", "/about"), ("contact", "/contact")];

fn public_path(slug: &str) -> Option<&'static str> {
    EDITABLE_PAGES
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, path)| *path)
}

#[derive(Clone, Debug)]
pub struct PageRowView {
    pub slug: &'static str,
    pub title: String,
    pub public_path: &'static str,
    /// `None` while the shipped file is in use.
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PageInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub body_markdown: String,
    #[validate(length(max = 160, message = "Meta description should be at most 160 characters"))]
    #[serde(default)]
    pub meta_description: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/pages/index.html")]
pub struct PagesIndexTemplate {
    pub layout: DashboardLayout,
    pub pages: Vec<PageRowView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/pages/form.html")]
pub struct PageFormTemplate {
    pub layout: DashboardLayout,
    pub slug: String,
    pub public_path: &'static str,
    pub form: PageInput,
    pub error: Option<String>,
}

/// `GET /dashboard/pages`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ContentWrite>,
) -> Result<PagesIndexTemplate> {
    let mut pages = Vec::with_capacity(EDITABLE_PAGES.len());
    for &(slug, public_path) in EDITABLE_PAGES {
        let page = load_page(&state, slug).await?;
        pages.push(PageRowView {
            slug,
            title: page.as_ref().map_or_else(|| slug.to_owned(), |p| p.title.clone()),
            public_path,
            updated_at: page.and_then(|p| p.updated_at).as_ref().map(date_time),
        });
    }

    Ok(PagesIndexTemplate {
        layout: shell.layout(&state, "Pages"),
        pages,
    })
}

/// `GET /dashboard/pages/{slug}`
#[instrument(skip(state, shell, _guard))]
pub async fn edit(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ContentWrite>,
    Path(slug): Path<String>,
) -> Result<PageFormTemplate> {
    let public_path =
        public_path(&slug).ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;
    let form = load_page(&state, &slug)
        .await?
        .map(|page| PageInput {
            title: page.title,
            body_markdown: page.body_markdown,
            meta_description: page.meta_description.unwrap_or_default(),
        })
        .unwrap_or_default();

    Ok(PageFormTemplate {
        layout: shell.layout(&state, format!("Edit {slug}")),
        slug,
        public_path,
        form,
        error: None,
    })
}

/// `POST /dashboard/pages/{slug}`
#[instrument(skip(state, shell, _guard, session, form))]
pub async fn update(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::ContentWrite>,
    session: Session,
    Path(slug): Path<String>,
    Form(form): Form<PageInput>,
) -> Result<Response> {
    let public_path =
        public_path(&slug).ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;

    if let Err(errors) = form.validate() {
        return Ok(PageFormTemplate {
            layout: shell.layout(&state, format!("Edit {slug}")),
            error: Some(first_validation_message(&errors)),
            slug,
            public_path,
            form,
        }
        .into_response());
    }

    let parsed = Slug::parse(&slug).map_err(|e| AppError::BadRequest(e.to_string()))?;
    PageRepository::new(state.pool())
        .upsert(
            &parsed,
            form.title.trim(),
            &form.body_markdown,
            non_empty(&form.meta_description).as_deref(),
        )
        .await?;
    state.seo().invalidate_path(public_path).await;
    info!(slug, "Page saved");
    set_flash(&session, "Page saved.").await;

    Ok(Redirect::to(&format!("/dashboard/pages/{slug}")).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert_eq!(public_path("home"), Some("/"));
        assert_eq!(public_path("contact"), Some("/contact"));
        assert_eq!(public_path("privacy"), None);
    }
}
