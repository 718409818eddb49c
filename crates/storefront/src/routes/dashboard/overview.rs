//! Dashboard overview.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use handset_core::session::Permission;

use crate::db::{MessageRepository, OrderRepository, ProductRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequestSession;
use crate::routes::account::OrderRowView;
use crate::state::AppState;
use crate::views::money;

use super::{DashboardLayout, DashboardShell};

const RECENT_ORDERS: i64 = 5;

/// Headline numbers; `None` for areas the role can't see.
#[derive(Clone, Debug, Default)]
pub struct OverviewStats {
    pub products: Option<ProductStatsView>,
    pub orders: Option<OrderStatsView>,
    pub unread_messages: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ProductStatsView {
    pub published: i64,
    pub draft: i64,
    pub archived: i64,
    pub low_stock: i64,
}

#[derive(Clone, Debug)]
pub struct OrderStatsView {
    pub total_orders: i64,
    pub pending: i64,
    pub revenue: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/overview.html")]
pub struct OverviewTemplate {
    pub layout: DashboardLayout,
    pub stats: OverviewStats,
    pub recent_orders: Vec<OrderRowView>,
}

/// `GET /dashboard`
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    RequestSession(resolver): RequestSession,
) -> Result<OverviewTemplate> {
    let pool = state.pool();
    let currency = state.config().currency;
    let mut stats = OverviewStats::default();
    let mut recent_orders = Vec::new();

    if resolver.has_permission(Permission::ProductsRead).await {
        let counts = ProductRepository::new(pool).counts().await?;
        stats.products = Some(ProductStatsView {
            published: counts.published,
            draft: counts.draft,
            archived: counts.archived,
            low_stock: counts.low_stock,
        });
    }

    if resolver.has_permission(Permission::OrdersRead).await {
        let orders = OrderRepository::new(pool);
        let order_stats = orders.stats().await?;
        stats.orders = Some(OrderStatsView {
            total_orders: order_stats.total_orders,
            pending: order_stats.pending,
            revenue: money(order_stats.revenue, currency),
        });
        recent_orders = orders
            .list_all(None, RECENT_ORDERS)
            .await?
            .iter()
            .map(|o| OrderRowView::new(o, currency))
            .collect();
    }

    if resolver.has_permission(Permission::MessagesRead).await {
        stats.unread_messages = Some(MessageRepository::new(pool).unread_count().await?);
    }

    Ok(OverviewTemplate {
        layout: shell.layout(&state, "Overview"),
        stats,
        recent_orders,
    })
}
