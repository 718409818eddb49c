//! Blog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use crate::content::{excerpt, reading_time, render_markdown};
use crate::db::PostRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::models::{Paginated, Post};
use crate::services::seo::{PageMeta, blog_posting_json_ld, breadcrumb_json_ld};
use crate::state::AppState;
use crate::views::{Layout, PaginationView, Shell, short_date};

const POSTS_PER_PAGE: u32 = 9;
const EXCERPT_CHARS: usize = 180;

/// A post in a listing.
#[derive(Clone, Debug)]
pub struct PostSummaryView {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub published_on: String,
    pub reading_minutes: u32,
}

impl From<&Post> for PostSummaryView {
    fn from(post: &Post) -> Self {
        Self {
            slug: post.slug.to_string(),
            title: post.title.clone(),
            excerpt: post
                .excerpt
                .clone()
                .unwrap_or_else(|| excerpt(&post.body_markdown, EXCERPT_CHARS)),
            cover_image: post.cover_image.clone(),
            published_on: post.published_at.as_ref().map(short_date).unwrap_or_default(),
            reading_minutes: reading_time(&post.body_markdown),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogQuery {
    pub page: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub layout: Layout,
    pub posts: Vec<PostSummaryView>,
    pub pagination: PaginationView,
}

#[derive(Template, WebTemplate)]
#[template(path = "blog/show.html")]
pub struct BlogShowTemplate {
    pub layout: Layout,
    pub post: PostSummaryView,
    pub body_html: String,
}

/// `GET /blog`
#[instrument(skip(state, shell))]
pub async fn index(
    State(state): State<AppState>,
    shell: Shell,
    Query(query): Query<BlogQuery>,
) -> Result<BlogIndexTemplate> {
    let page = query
        .page
        .as_deref()
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|&p| p > 0)
        .unwrap_or(1);

    let repo = PostRepository::new(state.pool());
    let offset = i64::from(page - 1) * i64::from(POSTS_PER_PAGE);
    let posts = repo.list_published(i64::from(POSTS_PER_PAGE), offset).await?;
    let total = repo.count_published().await?;

    let listing = Paginated {
        items: posts,
        page,
        per_page: POSTS_PER_PAGE,
        total: u64::try_from(total).unwrap_or(0),
    };
    let pagination = PaginationView::new(&listing, |p| format!("?page={p}"));

    let mut meta = PageMeta::new("Blog")
        .with_description(Some("Reviews, buying guides and news from our phone experts."));
    if page > 1 {
        meta = meta.noindex();
    }

    Ok(BlogIndexTemplate {
        layout: shell.layout(&state, meta).await,
        posts: listing.items.iter().map(PostSummaryView::from).collect(),
        pagination,
    })
}

/// `GET /blog/{slug}`. Drafts are not found.
#[instrument(skip(state, shell))]
pub async fn show(
    State(state): State<AppState>,
    shell: Shell,
    Path(slug): Path<String>,
) -> Result<BlogShowTemplate> {
    let post = PostRepository::new(state.pool())
        .get_published_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {slug}")))?;

    let config = state.config();
    let view = PostSummaryView::from(&post);
    let path = format!("/blog/{}", post.slug);
    let meta = PageMeta::new(&post.title)
        .with_description(Some(view.excerpt.clone()))
        .with_image(post.cover_image.clone())
        .with_json_ld(&blog_posting_json_ld(&post, &config.base_url, &config.site_name))
        .with_json_ld(&breadcrumb_json_ld(
            &[
                ("Home", "/"),
                ("Blog", "/blog"),
                (post.title.as_str(), path.as_str()),
            ],
            &config.base_url,
        ));

    Ok(BlogShowTemplate {
        layout: shell.layout(&state, meta).await,
        body_html: render_markdown(&post.body_markdown),
        post: view,
    })
}
