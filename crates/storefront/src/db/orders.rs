//! Order repository (`sales.order`, `sales.order_item`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use handset_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::{RepositoryError, parse_column};
use crate::models::{NewOrder, Order, OrderItem, OrderSummary, ShippingDetails};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    profile_id: Option<Uuid>,
    email: String,
    shipping_name: String,
    shipping_address: String,
    shipping_phone: String,
    status: String,
    subtotal: Decimal,
    total: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    product_id: Option<i32>,
    title: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: row.product_id.map(ProductId::new),
            title: row.title,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

fn order_from_rows(row: OrderRow, items: Vec<OrderItemRow>) -> Result<Order, RepositoryError> {
    let email = Email::parse(&row.email).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid order email in database: {e}"))
    })?;

    Ok(Order {
        id: OrderId::new(row.id),
        profile_id: row.profile_id.map(UserId::from_uuid),
        email,
        shipping: ShippingDetails {
            name: row.shipping_name,
            address: row.shipping_address,
            phone: row.shipping_phone,
        },
        status: parse_column("order status", &row.status)?,
        subtotal: row.subtotal,
        total: row.total,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
        items: items.into_iter().map(Into::into).collect(),
    })
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: i32,
    email: String,
    shipping_name: String,
    status: String,
    total: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderSummaryRow> for OrderSummary {
    type Error = RepositoryError;

    fn try_from(row: OrderSummaryRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order email in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            email,
            shipping_name: row.shipping_name,
            status: parse_column("order status", &row.status)?,
            total: row.total,
            item_count: row.item_count,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, profile_id, email, shipping_name, shipping_address, \
     shipping_phone, status, subtotal, total, notes, created_at, updated_at";

const SUMMARY_SELECT: &str = r#"
    SELECT o.id, o.email, o.shipping_name, o.status, o.total, o.created_at,
           COALESCE(SUM(i.quantity), 0)::BIGINT AS item_count
    FROM sales."order" o
    LEFT JOIN sales.order_item i ON i.order_id = o.id
"#;

/// Order counts and revenue for the dashboard overview.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending: i64,
    /// Sum of totals for orders that were paid and not refunded or cancelled.
    pub revenue: Decimal,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write an order and its items in one transaction and reserve stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order has no items.
    /// Returns `RepositoryError::Database` if any statement fails; nothing is written.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if order.items.is_empty() {
            return Err(RepositoryError::Conflict("Your cart is empty".to_owned()));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO sales."order" (
                profile_id, email, shipping_name, shipping_address, shipping_phone,
                status, subtotal, total, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.profile_id)
        .bind(order.email.as_str())
        .bind(order.shipping.name.trim())
        .bind(order.shipping.address.trim())
        .bind(order.shipping.phone.trim())
        .bind(OrderStatus::Pending.as_str())
        .bind(order.subtotal())
        .bind(order.total())
        .bind(order.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            let quantity = i32::try_from(line.quantity.get()).map_err(|_| {
                RepositoryError::Conflict(format!("Quantity too large for {}", line.title))
            })?;

            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO sales.order_item (order_id, product_id, title, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, product_id, title, unit_price, quantity, line_total
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(&line.title)
            .bind(line.effective_price())
            .bind(quantity)
            .bind(line.line_total())
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r"
                UPDATE catalog.product
                SET stock_quantity = GREATEST(stock_quantity - $2, 0), updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(line.product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        order_from_rows(row, items)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM sales."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, title, unit_price, quantity, line_total
            FROM sales.order_item WHERE order_id = $1 ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        order_from_rows(row, items).map(Some)
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_for_profile(
        &self,
        profile_id: UserId,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "{SUMMARY_SELECT} WHERE o.profile_id = $1 GROUP BY o.id ORDER BY o.created_at DESC"
        ))
        .bind(profile_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "{SUMMARY_SELECT} WHERE ($1::text IS NULL OR o.status = $1) \
             GROUP BY o.id ORDER BY o.created_at DESC LIMIT $2"
        ))
        .bind(status.map(OrderStatus::as_str))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Move an order to `next`, enforcing the status transition rules.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<OrderStatus, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: String =
            sqlx::query_scalar(r#"SELECT status FROM sales."order" WHERE id = $1 FOR UPDATE"#)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;
        let current: OrderStatus = parse_column("order status", &current)?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "Cannot change an order from {} to {}",
                current.label(),
                next.label()
            )));
        }

        sqlx::query(r#"UPDATE sales."order" SET status = $2, updated_at = NOW() WHERE id = $1"#)
            .bind(id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(next)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let (total_orders, pending, revenue): (i64, i64, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'pending'),
                COALESCE(SUM(total) FILTER (
                    WHERE status IN ('paid', 'processing', 'shipped', 'delivered')
                ), 0)
            FROM sales."order"
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        Ok(OrderStats {
            total_orders,
            pending,
            revenue,
        })
    }
}
