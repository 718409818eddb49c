use std::collections::HashMap;
use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// One product in the cart. At most one line per `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub title: String,
    pub slug: String,
    /// Regular price; the struck-through price when `sale_price` is set.
    pub unit_price: Decimal,
    pub sale_price: Option<Decimal>,
    pub image: Option<String>,
    pub quantity: NonZeroU32,
}

impl LineItem {
    /// A single unit of a published product.
    #[must_use]
    pub fn from_product(product: &CatalogProduct) -> Self {
        let (unit_price, sale_price) = product.pricing();
        Self {
            product_id: product.id,
            title: product.title.clone(),
            slug: product.slug.clone(),
            unit_price,
            sale_price,
            image: product.featured_image.clone(),
            quantity: NonZeroU32::MIN,
        }
    }

    /// Price actually charged per unit.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.unit_price)
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.effective_price() * Decimal::from(self.quantity.get())
    }

    /// Take display fields and prices from the catalog; keep id and quantity.
    fn refresh_from(&mut self, product: &CatalogProduct) {
        let (unit_price, sale_price) = product.pricing();
        self.title.clone_from(&product.title);
        self.slug.clone_from(&product.slug);
        self.unit_price = unit_price;
        self.sale_price = sale_price;
        self.image.clone_from(&product.featured_image);
    }
}

/// The slice of a published `catalog.product` row the cart needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub title: String,
    pub slug: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub on_sale: bool,
    pub featured_image: Option<String>,
}

impl CatalogProduct {
    /// `(unit_price, sale_price)` for a cart line.
    ///
    /// A product counts as discounted only when flagged on sale and its
    /// compare-at price is above the selling price; the compare-at price then
    /// becomes the unit price and the selling price the sale price.
    #[must_use]
    pub fn pricing(&self) -> (Decimal, Option<Decimal>) {
        match self.compare_at_price {
            Some(compare_at) if self.on_sale && compare_at > self.price => {
                (compare_at, Some(self.price))
            }
            _ => (self.price, None),
        }
    }
}

/// Re-synchronize `items` with the published `products`.
///
/// Items whose product is absent are dropped; the rest are refreshed in place
/// so relative order and quantities are preserved.
#[must_use]
pub fn reconcile_items(items: Vec<LineItem>, products: &[CatalogProduct]) -> Vec<LineItem> {
    let by_id: HashMap<ProductId, &CatalogProduct> =
        products.iter().map(|p| (p.id, p)).collect();

    items
        .into_iter()
        .filter_map(|mut item| {
            let product = by_id.get(&item.product_id)?;
            item.refresh_from(product);
            Some(item)
        })
        .collect()
}

/// `Σ effective_price × quantity`.
#[must_use]
pub fn total(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::line_total).sum()
}

/// `Σ quantity`.
#[must_use]
pub fn count(items: &[LineItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity.get())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, compare_at: Option<i64>, on_sale: bool) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            title: format!("Phone {id}"),
            slug: format!("phone-{id}"),
            price: Decimal::new(price, 0),
            compare_at_price: compare_at.map(|c| Decimal::new(c, 0)),
            on_sale,
            featured_image: None,
        }
    }

    #[test]
    fn test_pricing_only_discounts_real_sales() {
        assert_eq!(
            product(1, 100, Some(150), true).pricing(),
            (Decimal::new(150, 0), Some(Decimal::new(100, 0)))
        );
        // Flagged but compare-at not higher.
        assert_eq!(
            product(1, 100, Some(100), true).pricing(),
            (Decimal::new(100, 0), None)
        );
        // Higher compare-at but not flagged.
        assert_eq!(
            product(1, 100, Some(150), false).pricing(),
            (Decimal::new(100, 0), None)
        );
        assert_eq!(product(1, 100, None, true).pricing(), (Decimal::new(100, 0), None));
    }

    #[test]
    fn test_totals_use_sale_price() {
        let mut on_sale = LineItem::from_product(&product(1, 80, Some(100), true));
        on_sale.quantity = NonZeroU32::new(2).unwrap_or(NonZeroU32::MIN);
        let regular = LineItem::from_product(&product(2, 30, None, false));

        let items = vec![on_sale, regular];
        assert_eq!(total(&items), Decimal::new(190, 0));
        assert_eq!(count(&items), 3);
    }

    #[test]
    fn test_reconcile_drops_missing_and_keeps_order() {
        let items: Vec<_> = [3, 1, 2]
            .into_iter()
            .map(|id| LineItem::from_product(&product(id, 10, None, false)))
            .collect();
        let published = [product(2, 12, None, false), product(3, 10, None, false)];

        let reconciled = reconcile_items(items, &published);
        let ids: Vec<_> = reconciled.iter().map(|i| i.product_id.get()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(reconciled[1].unit_price, Decimal::new(12, 0));
    }
}
