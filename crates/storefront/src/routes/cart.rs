//! Cart route handlers.
//!
//! The cart lives in the visitor's session (see
//! [`SessionStorage`](crate::middleware::SessionStorage)). Requests that
//! touch it run one at a time per session, see
//! [`serialize_client_state`](crate::middleware::serialize_client_state).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, instrument};

use handset_core::cart::{self, LineItem};
use handset_core::{Currency, ProductId};

use crate::db::ProductRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::cart_for;
use crate::services::auth::is_local_path;
use crate::services::seo::PageMeta;
use crate::state::AppState;
use crate::views::{Layout, Shell, money, set_flash};

/// Cart line display data for templates.
#[derive(Clone, Debug)]
pub struct CartItemView {
    pub product_id: i32,
    pub slug: String,
    pub title: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: String,
    /// Struck-through regular price when the line is on sale.
    pub regular_price: Option<String>,
    pub line_price: String,
}

impl CartItemView {
    fn new(item: &LineItem, currency: Currency) -> Self {
        Self {
            product_id: item.product_id.get(),
            slug: item.slug.clone(),
            title: item.title.clone(),
            image: item.image.clone(),
            quantity: item.quantity.get(),
            price: money(item.effective_price(), currency),
            regular_price: item.sale_price.map(|_| money(item.unit_price, currency)),
            line_price: money(item.line_total(), currency),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone, Debug)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
}

impl CartView {
    #[must_use]
    pub fn new(items: &[LineItem], currency: Currency) -> Self {
        Self {
            items: items.iter().map(|i| CartItemView::new(i, currency)).collect(),
            subtotal: money(cart::total(items), currency),
            item_count: cart::count(items),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    /// Local path to go back to instead of `/cart`.
    pub return_to: Option<String>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    pub quantity: i64,
}

/// Remove line form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
}

#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// `GET /cart`
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    shell: Shell,
    session: Session,
) -> CartShowTemplate {
    let items = cart_for(&session, &state).hydrate().await;
    let mut layout = shell.layout_with(&state, PageMeta::new("Your cart").noindex());
    // The badge was computed before reconciliation dropped or merged lines.
    layout.cart_count = cart::count(&items);

    CartShowTemplate {
        layout,
        cart: CartView::new(&items, state.config().currency),
    }
}

/// `POST /cart/add`
///
/// Only published products can be added; anything else is ignored.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect> {
    let id = ProductId::new(form.product_id);
    let entries = ProductRepository::new(state.pool())
        .catalog_entries(&[id])
        .await?;

    let store = cart_for(&session, &state);
    match entries.first() {
        Some(product) => {
            store.add_item(LineItem::from_product(product)).await;
            set_flash(&session, format!("Added {} to your cart.", product.title)).await;
        }
        None => debug!(product_id = %id, "Ignoring add for unpublished product"),
    }

    let back = form.return_to.filter(|p| is_local_path(p));
    Ok(Redirect::to(back.as_deref().unwrap_or("/cart")))
}

/// `POST /cart/update`. A quantity of zero or less removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Redirect {
    cart_for(&session, &state)
        .update_quantity(ProductId::new(form.product_id), form.quantity)
        .await;
    Redirect::to("/cart")
}

/// `POST /cart/remove`
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Redirect {
    cart_for(&session, &state)
        .remove_item(ProductId::new(form.product_id))
        .await;
    Redirect::to("/cart")
}

/// `POST /cart/clear`
#[instrument(skip_all)]
pub async fn clear(State(state): State<AppState>, session: Session) -> Redirect {
    cart_for(&session, &state).clear().await;
    set_flash(&session, "Your cart is empty.").await;
    Redirect::to("/cart")
}

/// `GET /api/cart` body.
#[derive(Debug, Serialize)]
pub struct CartJson {
    pub items: Vec<LineItem>,
    pub count: u64,
    pub total: rust_decimal::Decimal,
    pub total_display: String,
    pub currency: &'static str,
}

/// `GET /api/cart`: the reconciled cart as JSON.
#[instrument(skip_all)]
pub async fn api_show(State(state): State<AppState>, session: Session) -> Response {
    let items = cart_for(&session, &state).hydrate().await;
    let currency = state.config().currency;
    let total = cart::total(&items);

    Json(CartJson {
        count: cart::count(&items),
        total,
        total_display: money(total, currency),
        currency: currency.code(),
        items,
    })
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use rust_decimal::Decimal;

    use super::*;

    fn line(id: i32, unit: i64, sale: Option<i64>, quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            title: format!("Phone {id}"),
            slug: format!("phone-{id}"),
            unit_price: Decimal::new(unit, 0),
            sale_price: sale.map(|s| Decimal::new(s, 0)),
            image: None,
            quantity: NonZeroU32::new(quantity).unwrap(),
        }
    }

    #[test]
    fn test_cart_view_uses_sale_price() {
        let view = CartView::new(
            &[line(1, 999, Some(899), 2), line(2, 49, None, 1)],
            Currency::Usd,
        );
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "$1,847.00");

        let first = view.items.first().unwrap();
        assert_eq!(first.price, "$899.00");
        assert_eq!(first.regular_price.as_deref(), Some("$999.00"));
        assert_eq!(first.line_price, "$1,798.00");
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::new(&[], Currency::Usd);
        assert!(view.is_empty());
        assert_eq!(view.subtotal, "$0.00");
    }
}
