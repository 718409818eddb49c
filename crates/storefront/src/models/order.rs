//! Orders placed at checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use handset_core::cart::{self, LineItem};
use handset_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// Where an order ships. Also the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingDetails {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 5, max = 500, message = "Shipping address is required"))]
    pub address: String,
    #[validate(length(min = 5, max = 40, message = "Phone number is required"))]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A `sales.order` row with its items.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub profile_id: Option<UserId>,
    pub email: Email,
    pub shipping: ShippingDetails,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Customer-facing order number, e.g. `HS-000042`.
    #[must_use]
    pub fn number(&self) -> String {
        order_number(self.id)
    }

    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.profile_id == Some(user)
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::try_from(item.quantity).unwrap_or(0))
            .sum()
    }
}

/// One row of an order list.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub email: Email,
    pub shipping_name: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderSummary {
    #[must_use]
    pub fn number(&self) -> String {
        order_number(self.id)
    }
}

#[must_use]
pub fn order_number(id: OrderId) -> String {
    format!("HS-{:06}", id.get())
}

/// An order about to be written at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub profile_id: UserId,
    pub email: Email,
    pub shipping: ShippingDetails,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
}

impl NewOrder {
    /// Sum of the lines at their charged prices.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        cart::total(&self.items)
    }

    /// No shipping, tax or discounts are applied, so this equals the subtotal.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.subtotal()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    fn line(id: i32, price: i64, sale: Option<i64>, qty: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            title: format!("Phone {id}"),
            slug: format!("phone-{id}"),
            unit_price: Decimal::new(price, 0),
            sale_price: sale.map(|s| Decimal::new(s, 0)),
            image: None,
            quantity: NonZeroU32::new(qty).unwrap(),
        }
    }

    #[test]
    fn test_new_order_totals_use_sale_prices() {
        let order = NewOrder {
            profile_id: UserId::from_subject("https://id.test", "a"),
            email: Email::parse("a@shop.test").unwrap(),
            shipping: ShippingDetails {
                name: "A".into(),
                address: "1 Main St".into(),
                phone: "555-0100".into(),
            },
            notes: None,
            items: vec![line(1, 999, Some(899), 2), line(2, 49, None, 1)],
        };
        assert_eq!(order.subtotal(), Decimal::new(1847, 0));
        assert_eq!(order.total(), order.subtotal());
    }

    #[test]
    fn test_order_number_is_zero_padded() {
        assert_eq!(order_number(OrderId::new(42)), "HS-000042");
    }

    #[test]
    fn test_shipping_validation() {
        let shipping = ShippingDetails {
            name: String::new(),
            address: "1 Main St".into(),
            phone: "555-0100".into(),
        };
        let errors = shipping.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }
}
