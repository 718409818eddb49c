//! Account route handlers.
//!
//! These routes require authentication. Orders are only ever shown to the
//! profile that placed them; anyone else gets a 404.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use handset_core::session::Identity;
use handset_core::{Currency, OrderId};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{OptionalProfile, RequireAuth};
use crate::models::{Order, OrderSummary};
use crate::services::invoice::{self, Invoice};
use crate::services::seo::PageMeta;
use crate::state::AppState;
use crate::views::{Layout, Shell, date_time, money, short_date};

const RECENT_ORDERS: usize = 3;

/// User display data for templates.
#[derive(Clone, Debug)]
pub struct UserView {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub member_since: Option<String>,
}

impl UserView {
    fn new(identity: &Identity, profile: Option<&handset_core::session::Profile>) -> Self {
        Self {
            email: identity.email.as_str().to_owned(),
            name: identity.full_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            role: profile.map_or("Customer", |p| p.role.label()).to_owned(),
            member_since: profile.map(|p| short_date(&p.created_at)),
        }
    }
}

/// Order list row.
#[derive(Clone, Debug)]
pub struct OrderRowView {
    pub id: i32,
    pub number: String,
    pub placed_on: String,
    pub status: String,
    pub status_class: &'static str,
    pub item_count: i64,
    pub total: String,
}

impl OrderRowView {
    #[must_use]
    pub fn new(order: &OrderSummary, currency: Currency) -> Self {
        Self {
            id: order.id.get(),
            number: order.number(),
            placed_on: short_date(&order.created_at),
            status: order.status.label().to_owned(),
            status_class: order.status.as_str(),
            item_count: order.item_count,
            total: money(order.total, currency),
        }
    }
}

/// Order line.
#[derive(Clone, Debug)]
pub struct OrderLineView {
    pub title: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

/// Full order display data, shared with the dashboard.
#[derive(Clone, Debug)]
pub struct OrderDetailView {
    pub id: i32,
    pub number: String,
    pub placed_at: String,
    pub updated_at: String,
    pub status: String,
    pub status_class: &'static str,
    pub email: String,
    pub shipping_name: String,
    pub shipping_address: String,
    pub shipping_phone: String,
    pub notes: Option<String>,
    pub lines: Vec<OrderLineView>,
    pub item_count: u64,
    pub subtotal: String,
    pub total: String,
}

impl OrderDetailView {
    #[must_use]
    pub fn new(order: &Order, currency: Currency) -> Self {
        Self {
            id: order.id.get(),
            number: order.number(),
            placed_at: date_time(&order.created_at),
            updated_at: date_time(&order.updated_at),
            status: order.status.label().to_owned(),
            status_class: order.status.as_str(),
            email: order.email.as_str().to_owned(),
            shipping_name: order.shipping.name.clone(),
            shipping_address: order.shipping.address.clone(),
            shipping_phone: order.shipping.phone.clone(),
            notes: order.notes.clone(),
            lines: order
                .items
                .iter()
                .map(|item| OrderLineView {
                    title: item.title.clone(),
                    quantity: item.quantity,
                    unit_price: money(item.unit_price, currency),
                    line_total: money(item.line_total, currency),
                })
                .collect(),
            item_count: order.item_count(),
            subtotal: money(order.subtotal, currency),
            total: money(order.total, currency),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub layout: Layout,
    pub user: UserView,
    pub recent_orders: Vec<OrderRowView>,
    pub order_count: usize,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct AccountOrdersTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderRowView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct AccountOrderTemplate {
    pub layout: Layout,
    pub order: OrderDetailView,
}

/// `GET /account`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    OptionalProfile(profile): OptionalProfile,
    shell: Shell,
) -> Result<AccountIndexTemplate> {
    let orders = OrderRepository::new(state.pool())
        .list_for_profile(identity.id)
        .await?;
    let currency = state.config().currency;

    Ok(AccountIndexTemplate {
        layout: shell.layout_with(&state, PageMeta::new("Your account").noindex()),
        user: UserView::new(&identity, profile.as_ref()),
        order_count: orders.len(),
        recent_orders: orders
            .iter()
            .take(RECENT_ORDERS)
            .map(|o| OrderRowView::new(o, currency))
            .collect(),
    })
}

/// `GET /account/orders`
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    shell: Shell,
) -> Result<AccountOrdersTemplate> {
    let orders = OrderRepository::new(state.pool())
        .list_for_profile(identity.id)
        .await?;
    let currency = state.config().currency;

    Ok(AccountOrdersTemplate {
        layout: shell.layout_with(&state, PageMeta::new("Your orders").noindex()),
        orders: orders.iter().map(|o| OrderRowView::new(o, currency)).collect(),
    })
}

async fn own_order(state: &AppState, identity: &Identity, id: i32) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get_by_id(OrderId::new(id))
        .await?
        .filter(|order| order.is_owned_by(identity.id))
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// `GET /account/orders/{id}`
#[instrument(skip(state, identity, shell))]
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    shell: Shell,
    Path(id): Path<i32>,
) -> Result<AccountOrderTemplate> {
    let order = own_order(&state, &identity, id).await?;
    let title = format!("Order {}", order.number());

    Ok(AccountOrderTemplate {
        layout: shell.layout_with(&state, PageMeta::new(title).noindex()),
        order: OrderDetailView::new(&order, state.config().currency),
    })
}

/// `GET /account/orders/{id}/invoice.pdf`
#[instrument(skip(state, identity))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Response> {
    let order = own_order(&state, &identity, id).await?;
    invoice_response(&state, &order).await
}

/// Render `order` as a PDF download.
///
/// Layout runs on the blocking pool; genpdf is CPU bound and reads fonts
/// from disk.
pub(crate) async fn invoice_response(state: &AppState, order: &Order) -> Result<Response> {
    let config = state.config();
    let invoice = Invoice::from_order(order, &config.site_name, config.currency);
    let fonts = config.invoice.clone();
    let file_name = invoice.file_name();

    let bytes = tokio::task::spawn_blocking(move || invoice::render(&invoice, &fonts))
        .await
        .map_err(|e| AppError::Internal(format!("invoice task failed: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
            (header::CACHE_CONTROL, "private, no-store".to_owned()),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use handset_core::{Email, OrderItemId, OrderStatus, ProductId, UserId};

    use super::*;
    use crate::models::{OrderItem, ShippingDetails};

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            profile_id: Some(UserId::from_subject("https://id.example.com", "abc")),
            email: Email::parse("buyer@example.com").unwrap(),
            shipping: ShippingDetails {
                name: "Ada Lovelace".into(),
                address: "12 Analytical Row\nLondon".into(),
                phone: "+44 20 0000 0000".into(),
            },
            status: OrderStatus::Shipped,
            subtotal: Decimal::new(1_798, 0),
            total: Decimal::new(1_798, 0),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                product_id: Some(ProductId::new(7)),
                title: "Galaxy S25".into(),
                unit_price: Decimal::new(899, 0),
                quantity: 2,
                line_total: Decimal::new(1_798, 0),
            }],
        }
    }

    #[test]
    fn test_order_detail_view_formats_money_and_status() {
        let view = OrderDetailView::new(&order(), Currency::Usd);
        assert_eq!(view.number, "HS-000042");
        assert_eq!(view.status, "Shipped");
        assert_eq!(view.status_class, "shipped");
        assert_eq!(view.item_count, 2);
        assert_eq!(view.total, "$1,798.00");
        assert_eq!(view.lines.first().unwrap().unit_price, "$899.00");
    }
}
