//! Favourites route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, Json, extract::State, response::Redirect};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use handset_core::ProductId;

use crate::db::ProductRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::favourites_for;
use crate::services::auth::is_local_path;
use crate::services::seo::PageMeta;
use crate::state::AppState;
use crate::views::{Layout, ProductCard, Shell, set_flash};

#[derive(Template, WebTemplate)]
#[template(path = "favourites.html")]
pub struct FavouritesTemplate {
    pub layout: Layout,
    pub products: Vec<ProductCard>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub product_id: i32,
    pub return_to: Option<String>,
}

/// `GET /favourites`: saved products still in the catalog, in saved order.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
) -> Result<FavouritesTemplate> {
    let ids = favourites_for(&session).ids().await;
    let mut products = ProductRepository::new(state.pool())
        .published_by_ids(&ids)
        .await?;
    products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));

    Ok(FavouritesTemplate {
        layout: shell.layout_with(&state, PageMeta::new("Favourites").noindex()),
        products: ProductCard::list(&products, state.config().currency, &ids),
    })
}

/// `POST /favourites/toggle`
#[instrument(skip(session))]
pub async fn toggle(session: Session, Form(form): Form<ToggleForm>) -> Redirect {
    let added = favourites_for(&session)
        .toggle(ProductId::new(form.product_id))
        .await;
    set_flash(
        &session,
        if added {
            "Saved to favourites."
        } else {
            "Removed from favourites."
        },
    )
    .await;

    let back = form.return_to.filter(|p| is_local_path(p));
    Redirect::to(back.as_deref().unwrap_or("/favourites"))
}

#[derive(Debug, Serialize)]
pub struct FavouritesJson {
    pub ids: Vec<ProductId>,
}

/// `GET /api/favourites`
#[instrument(skip_all)]
pub async fn api_index(session: Session) -> Json<FavouritesJson> {
    Json(FavouritesJson {
        ids: favourites_for(&session).ids().await,
    })
}
