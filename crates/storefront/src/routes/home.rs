//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use crate::content::render_markdown;
use crate::db::{PostRepository, ProductRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::favourites_for;
use crate::routes::blog::PostSummaryView;
use crate::routes::pages::load_page;
use crate::services::seo::{PageMeta, organization_json_ld};
use crate::state::AppState;
use crate::views::{Layout, ProductCard, Shell};

const FEATURED_COUNT: i64 = 8;
const LATEST_POSTS: i64 = 3;

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub intro_html: String,
    pub featured: Vec<ProductCard>,
    pub posts: Vec<PostSummaryView>,
}

/// `GET /`
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
) -> Result<HomeTemplate> {
    let config = state.config();
    let page = load_page(&state, "home").await?;
    let featured = ProductRepository::new(state.pool())
        .featured(FEATURED_COUNT)
        .await?;
    let posts = PostRepository::new(state.pool())
        .list_published(LATEST_POSTS, 0)
        .await?;
    let favourites = favourites_for(&session).ids().await;

    let meta = PageMeta::new(&config.site_name)
        .with_description(page.as_ref().and_then(|p| p.meta_description.clone()))
        .with_json_ld(&organization_json_ld(&config.site_name, &config.base_url));

    Ok(HomeTemplate {
        layout: shell.layout(&state, meta).await,
        intro_html: page
            .map(|p| render_markdown(&p.body_markdown))
            .unwrap_or_default(),
        featured: ProductCard::list(&featured, config.currency, &favourites),
        posts: posts.iter().map(PostSummaryView::from).collect(),
    })
}
