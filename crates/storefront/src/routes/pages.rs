//! Editable content pages: about and contact.
//!
//! Copy comes from `content.page`; until an editor saves a version, the
//! markdown files under `content/pages` are served instead.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, instrument};
use validator::Validate;

use handset_core::Email;

use crate::content::render_markdown;
use crate::db::{MessageRepository, PageRepository};
use crate::error::{AppError, Result, add_breadcrumb, first_validation_message};
use crate::filters;
use crate::models::catalog::non_empty;
use crate::models::{ContentPage, NewContactMessage};
use crate::services::seo::PageMeta;
use crate::state::AppState;
use crate::views::{Layout, Shell, set_flash};

/// A stored page, or its bundled fallback.
///
/// # Errors
///
/// Returns an error if the database lookup fails.
pub async fn load_page(state: &AppState, slug: &str) -> Result<Option<ContentPage>> {
    if let Some(page) = PageRepository::new(state.pool()).get(slug).await? {
        return Ok(Some(page));
    }
    Ok(state.fallback_pages().get(slug).cloned())
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/show.html")]
pub struct PageTemplate {
    pub layout: Layout,
    pub title: String,
    pub body_html: String,
}

/// Contact form values echoed back after a validation error.
#[derive(Clone, Debug, Default)]
pub struct ContactFormView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
}

impl From<&NewContactMessage> for ContactFormView {
    fn from(form: &NewContactMessage) -> Self {
        Self {
            name: form.name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            subject: form.subject.clone(),
            message: form.message.clone(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub layout: Layout,
    pub title: String,
    pub body_html: String,
    pub form: ContactFormView,
    pub error: Option<String>,
}

/// `GET /about`
#[instrument(skip(state, shell))]
pub async fn about(State(state): State<AppState>, shell: Shell) -> Result<PageTemplate> {
    let page = load_page(&state, "about")
        .await?
        .ok_or_else(|| AppError::NotFound("about".to_owned()))?;

    let meta = PageMeta::new(&page.title).with_description(page.meta_description.clone());
    Ok(PageTemplate {
        layout: shell.layout(&state, meta).await,
        body_html: render_markdown(&page.body_markdown),
        title: page.title,
    })
}

async fn contact_template(
    state: &AppState,
    shell: Shell,
    form: ContactFormView,
    error: Option<String>,
) -> Result<ContactTemplate> {
    let page = load_page(state, "contact").await?;
    let (title, body_html, description) = page.map_or_else(
        || ("Contact us".to_owned(), String::new(), None),
        |p| (p.title, render_markdown(&p.body_markdown), p.meta_description),
    );

    Ok(ContactTemplate {
        layout: shell
            .layout(state, PageMeta::new(&title).with_description(description))
            .await,
        title,
        body_html,
        form,
        error,
    })
}

/// `GET /contact`
#[instrument(skip(state, shell))]
pub async fn contact(State(state): State<AppState>, shell: Shell) -> Result<ContactTemplate> {
    contact_template(&state, shell, ContactFormView::default(), None).await
}

/// `POST /contact`: store the message and redirect back with a notice.
#[instrument(skip_all)]
pub async fn submit_contact(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
    Form(form): Form<NewContactMessage>,
) -> Result<Response> {
    let error = form.validate().err().map(|e| first_validation_message(&e));
    let email = match (error, Email::parse(&form.email)) {
        (None, Ok(email)) => email,
        (error, _) => {
            let error = error.unwrap_or_else(|| "Please enter a valid email address".to_owned());
            let page = contact_template(&state, shell, ContactFormView::from(&form), Some(error));
            return Ok(page.await?.into_response());
        }
    };

    let id = MessageRepository::new(state.pool())
        .create(
            form.name.trim(),
            &email,
            non_empty(&form.phone).as_deref(),
            non_empty(&form.subject).as_deref(),
            form.message.trim(),
        )
        .await?;

    info!(message_id = %id, "Contact message received");
    add_breadcrumb("contact", "Contact message stored", None);
    set_flash(&session, "Thanks! We'll get back to you within one business day.").await;
    Ok(Redirect::to("/contact").into_response())
}
