//! Dashboard blog management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, instrument};

use handset_core::{PostId, PostStatus};

use crate::db::{PostRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::{Post, PostDraft, PostInput};
use crate::state::AppState;
use crate::views::{set_flash, short_date};

use super::{DashboardLayout, DashboardShell, SelectOption};

#[derive(Clone, Debug)]
pub struct PostRowView {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub status: &'static str,
    pub is_published: bool,
    pub published_on: Option<String>,
    pub updated_on: String,
}

impl From<&Post> for PostRowView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.get(),
            slug: post.slug.to_string(),
            title: post.title.clone(),
            status: post.status.as_str(),
            is_published: post.is_published(),
            published_on: post.published_at.as_ref().map(short_date),
            updated_on: short_date(&post.updated_at),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PostFormView {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub cover_image: String,
    pub statuses: Vec<SelectOption>,
}

impl PostFormView {
    fn with_status(mut self, status: PostStatus) -> Self {
        self.statuses = PostStatus::ALL
            .iter()
            .map(|s| SelectOption::new(s.as_str(), s.as_str(), *s == status))
            .collect();
        self
    }
}

impl From<&Post> for PostFormView {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.slug.to_string(),
            excerpt: post.excerpt.clone().unwrap_or_default(),
            body_markdown: post.body_markdown.clone(),
            cover_image: post.cover_image.clone().unwrap_or_default(),
            statuses: Vec::new(),
        }
        .with_status(post.status)
    }
}

impl From<&PostInput> for PostFormView {
    fn from(input: &PostInput) -> Self {
        Self {
            title: input.title.clone(),
            slug: input.slug.clone(),
            excerpt: input.excerpt.clone(),
            body_markdown: input.body_markdown.clone(),
            cover_image: input.cover_image.clone(),
            statuses: Vec::new(),
        }
        .with_status(input.status)
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/posts/index.html")]
pub struct PostsIndexTemplate {
    pub layout: DashboardLayout,
    pub posts: Vec<PostRowView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/posts/form.html")]
pub struct PostFormTemplate {
    pub layout: DashboardLayout,
    pub action: String,
    pub post_id: Option<i32>,
    pub form: PostFormView,
    pub error: Option<String>,
}

impl PostFormTemplate {
    fn invalid(
        state: &AppState,
        shell: DashboardShell,
        post_id: Option<i32>,
        input: &PostInput,
        error: String,
    ) -> Response {
        let (title, action) = match post_id {
            Some(id) => ("Edit post", format!("/dashboard/posts/{id}")),
            None => ("New post", "/dashboard/posts".to_owned()),
        };
        Self {
            layout: shell.layout(state, title),
            action,
            post_id,
            form: PostFormView::from(input),
            error: Some(error),
        }
        .into_response()
    }
}

async fn after_write(state: &AppState, post: &Post) {
    state
        .seo()
        .invalidate_path(&format!("/blog/{}", post.slug))
        .await;
}

/// `GET /dashboard/posts`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::BlogWrite>,
) -> Result<PostsIndexTemplate> {
    let posts = PostRepository::new(state.pool()).list_all().await?;
    Ok(PostsIndexTemplate {
        layout: shell.layout(&state, "Blog posts"),
        posts: posts.iter().map(PostRowView::from).collect(),
    })
}

/// `GET /dashboard/posts/new`
#[instrument(skip_all)]
pub async fn new(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::BlogWrite>,
) -> PostFormTemplate {
    PostFormTemplate {
        layout: shell.layout(&state, "New post"),
        action: "/dashboard/posts".to_owned(),
        post_id: None,
        form: PostFormView::default().with_status(PostStatus::Draft),
        error: None,
    }
}

/// `POST /dashboard/posts`. The signed-in profile becomes the author.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequirePermission(profile, _): RequirePermission<can::BlogWrite>,
    session: Session,
    Form(input): Form<PostInput>,
) -> Result<Response> {
    let draft = match PostDraft::try_from(input.clone()) {
        Ok(draft) => draft,
        Err(message) => return Ok(PostFormTemplate::invalid(&state, shell, None, &input, message)),
    };

    match PostRepository::new(state.pool()).create(&draft, profile.id).await {
        Ok(post) => {
            after_write(&state, &post).await;
            info!(post_id = %post.id, slug = %post.slug, "Post created");
            set_flash(&session, format!("Created {}.", post.title)).await;
            Ok(Redirect::to(&format!("/dashboard/posts/{}/edit", post.id)).into_response())
        }
        Err(RepositoryError::Conflict(message)) => {
            Ok(PostFormTemplate::invalid(&state, shell, None, &input, message))
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /dashboard/posts/{id}/edit`
#[instrument(skip(state, shell, _guard))]
pub async fn edit(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::BlogWrite>,
    Path(id): Path<i32>,
) -> Result<PostFormTemplate> {
    let post = PostRepository::new(state.pool())
        .get_by_id(PostId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {id}")))?;

    Ok(PostFormTemplate {
        layout: shell.layout(&state, format!("Edit {}", post.title)),
        action: format!("/dashboard/posts/{id}"),
        post_id: Some(id),
        form: PostFormView::from(&post),
        error: None,
    })
}

/// `POST /dashboard/posts/{id}`
///
/// `published_at` is stamped the first time a post is published and kept
/// afterwards.
#[instrument(skip(state, shell, _guard, session, input))]
pub async fn update(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::BlogWrite>,
    session: Session,
    Path(id): Path<i32>,
    Form(input): Form<PostInput>,
) -> Result<Response> {
    let draft = match PostDraft::try_from(input.clone()) {
        Ok(draft) => draft,
        Err(message) => {
            return Ok(PostFormTemplate::invalid(&state, shell, Some(id), &input, message));
        }
    };

    match PostRepository::new(state.pool()).update(PostId::new(id), &draft).await {
        Ok(post) => {
            after_write(&state, &post).await;
            info!(post_id = %post.id, "Post updated");
            set_flash(&session, format!("Saved {}.", post.title)).await;
            Ok(Redirect::to(&format!("/dashboard/posts/{id}/edit")).into_response())
        }
        Err(RepositoryError::Conflict(message)) => {
            Ok(PostFormTemplate::invalid(&state, shell, Some(id), &input, message))
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /dashboard/posts/{id}/delete`
#[instrument(skip(state, _guard, session))]
pub async fn delete(
    State(state): State<AppState>,
    _guard: RequirePermission<can::BlogWrite>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    PostRepository::new(state.pool()).delete(PostId::new(id)).await?;
    state.seo().invalidate_documents().await;
    set_flash(&session, "Post deleted.").await;
    Ok(Redirect::to("/dashboard/posts"))
}
