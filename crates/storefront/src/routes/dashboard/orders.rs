//! Dashboard order management.
//!
//! Status changes follow [`OrderStatus::can_transition_to`]; the repository
//! rejects anything else with a conflict.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use handset_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequirePermission, can};
use crate::models::Order;
use crate::routes::account::{OrderDetailView, OrderRowView, invoice_response};
use crate::state::AppState;
use crate::views::set_flash;

use super::{DashboardLayout, DashboardShell, SelectOption};

const LIST_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: OrderStatus,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/orders/index.html")]
pub struct OrdersIndexTemplate {
    pub layout: DashboardLayout,
    pub orders: Vec<OrderRowView>,
    pub statuses: Vec<SelectOption>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: DashboardLayout,
    pub order: OrderDetailView,
    /// Statuses the order may move to next. Empty when terminal.
    pub next_statuses: Vec<SelectOption>,
}

fn next_statuses(current: OrderStatus) -> Vec<SelectOption> {
    OrderStatus::ALL
        .iter()
        .filter(|next| current.can_transition_to(**next))
        .map(|next| SelectOption::new(next.as_str(), next.label(), false))
        .collect()
}

async fn find(state: &AppState, id: i32) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get_by_id(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// `GET /dashboard/orders?status=`
#[instrument(skip(state, shell, _guard))]
pub async fn index(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::OrdersRead>,
    Query(filter): Query<OrderFilter>,
) -> Result<OrdersIndexTemplate> {
    let status = filter
        .status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok());
    let orders = OrderRepository::new(state.pool())
        .list_all(status, LIST_LIMIT)
        .await?;
    let currency = state.config().currency;

    Ok(OrdersIndexTemplate {
        layout: shell.layout(&state, "Orders"),
        orders: orders.iter().map(|o| OrderRowView::new(o, currency)).collect(),
        statuses: OrderStatus::ALL
            .iter()
            .map(|s| SelectOption::new(s.as_str(), s.label(), Some(*s) == status))
            .collect(),
    })
}

/// `GET /dashboard/orders/{id}`
#[instrument(skip(state, shell, _guard))]
pub async fn show(
    State(state): State<AppState>,
    shell: DashboardShell,
    _guard: RequirePermission<can::OrdersRead>,
    Path(id): Path<i32>,
) -> Result<OrderShowTemplate> {
    let order = find(&state, id).await?;
    Ok(OrderShowTemplate {
        layout: shell.layout(&state, format!("Order {}", order.number())),
        next_statuses: next_statuses(order.status),
        order: OrderDetailView::new(&order, state.config().currency),
    })
}

async fn change_status(state: &AppState, id: i32, next: OrderStatus) -> Result<OrderStatus> {
    let status = OrderRepository::new(state.pool())
        .update_status(OrderId::new(id), next)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(message) => AppError::Validation(message),
            RepositoryError::NotFound => AppError::NotFound(format!("order {id}")),
            other => AppError::Database(other),
        })?;
    add_breadcrumb("orders", "Status changed", Some(&[("status", status.as_str())]));
    info!(order_id = id, status = %status, "Order status changed");
    Ok(status)
}

/// `POST /dashboard/orders/{id}/status`
#[instrument(skip(state, _guard, session))]
pub async fn update_status(
    State(state): State<AppState>,
    _guard: RequirePermission<can::OrdersWrite>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    match change_status(&state, id, form.status).await {
        Ok(status) => set_flash(&session, format!("Order marked {}.", status.label())).await,
        Err(AppError::Validation(message)) => set_flash(&session, message).await,
        Err(e) => return Err(e),
    }
    Ok(Redirect::to(&format!("/dashboard/orders/{id}")))
}

#[derive(Debug, Serialize)]
pub struct StatusJson {
    pub id: i32,
    pub status: OrderStatus,
    pub label: &'static str,
}

/// `POST /dashboard/api/orders/{id}/status` with `{ "status": "shipped" }`.
///
/// Rejected transitions answer 422 `{ "error": ... }`.
#[instrument(skip(state, _guard))]
pub async fn api_update_status(
    State(state): State<AppState>,
    _guard: RequirePermission<can::OrdersWrite>,
    Path(id): Path<i32>,
    Json(body): Json<StatusForm>,
) -> Response {
    match change_status(&state, id, body.status).await {
        Ok(status) => Json(StatusJson {
            id,
            status,
            label: status.label(),
        })
        .into_response(),
        Err(e) => e.into_json_response(),
    }
}

/// `GET /dashboard/orders/{id}/invoice.pdf`
#[instrument(skip(state, _guard))]
pub async fn invoice(
    State(state): State<AppState>,
    _guard: RequirePermission<can::OrdersRead>,
    Path(id): Path<i32>,
) -> Result<Response> {
    let order = find(&state, id).await?;
    invoice_response(&state, &order).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(status: OrderStatus) -> Vec<String> {
        next_statuses(status).into_iter().map(|o| o.value).collect()
    }

    #[test]
    fn test_next_statuses_follow_transitions() {
        assert_eq!(values(OrderStatus::Pending), vec!["paid", "cancelled"]);
        assert_eq!(values(OrderStatus::Shipped), vec!["delivered", "refunded"]);
        assert!(values(OrderStatus::Cancelled).is_empty());
    }
}
