//! PDF invoices for orders.
//!
//! The printable content is assembled first as an [`Invoice`] (plain strings,
//! easy to test), then laid out with `genpdf`. Fonts are read from
//! `INVOICE_FONT_DIR` on every render so a missing font directory only breaks
//! invoice downloads, not startup.

use genpdf::{Alignment, Element, elements, style};
use thiserror::Error;

use handset_core::{Currency, Money};

use crate::config::InvoiceConfig;
use crate::models::Order;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice fonts unavailable: {0}")]
    Fonts(String),

    #[error("invoice layout failed: {0}")]
    Layout(String),

    #[error("invoice render failed: {0}")]
    Render(String),
}

/// One printed item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
}

/// Everything printed on an invoice, already formatted.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub seller: String,
    pub number: String,
    pub date: String,
    pub status: String,
    pub bill_to: Vec<String>,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: String,
    pub total: String,
    pub notes: Option<String>,
}

impl Invoice {
    #[must_use]
    pub fn from_order(order: &Order, seller: &str, currency: Currency) -> Self {
        let money = |amount| Money::new(amount, currency).to_string();

        let mut bill_to = vec![order.shipping.name.clone()];
        bill_to.extend(
            order
                .shipping
                .address
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned),
        );
        bill_to.push(order.shipping.phone.clone());
        bill_to.push(order.email.as_str().to_owned());

        Self {
            seller: seller.to_owned(),
            number: order.number(),
            date: order.created_at.format("%B %-d, %Y").to_string(),
            status: order.status.label().to_owned(),
            bill_to,
            lines: order
                .items
                .iter()
                .map(|item| InvoiceLine {
                    description: item.title.clone(),
                    quantity: item.quantity.to_string(),
                    unit_price: money(item.unit_price),
                    line_total: money(item.line_total),
                })
                .collect(),
            subtotal: money(order.subtotal),
            total: money(order.total),
            notes: order.notes.clone().filter(|n| !n.trim().is_empty()),
        }
    }

    /// File name offered to the browser.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("invoice-{}.pdf", self.number)
    }
}

/// Lay out and render `invoice` to PDF bytes.
///
/// # Errors
///
/// Returns `InvoiceError::Fonts` if the configured font family can't be loaded,
/// and `InvoiceError::Layout`/`Render` if genpdf rejects the document.
pub fn render(invoice: &Invoice, config: &InvoiceConfig) -> Result<Vec<u8>, InvoiceError> {
    let fonts = genpdf::fonts::from_files(&config.font_dir, &config.font_name, None)
        .map_err(|e| InvoiceError::Fonts(format!("{}: {e}", config.font_dir.display())))?;

    let mut doc = genpdf::Document::new(fonts);
    doc.set_title(format!("Invoice {}", invoice.number));
    doc.set_font_size(10);
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(12);
    doc.set_page_decorator(decorator);

    let bold = style::Style::new().bold();

    doc.push(
        elements::Paragraph::new(invoice.seller.as_str())
            .styled(style::Style::new().bold().with_font_size(18)),
    );
    doc.push(elements::Break::new(1));
    doc.push(
        elements::Paragraph::new(format!("Invoice {}", invoice.number))
            .styled(style::Style::new().bold().with_font_size(14)),
    );
    doc.push(elements::Paragraph::new(format!("Date: {}", invoice.date)));
    doc.push(elements::Paragraph::new(format!("Status: {}", invoice.status)));
    doc.push(elements::Break::new(1.5));

    doc.push(elements::Paragraph::new("Bill to").styled(bold));
    for line in &invoice.bill_to {
        doc.push(elements::Paragraph::new(line.as_str()));
    }
    doc.push(elements::Break::new(1.5));

    let mut table = elements::TableLayout::new(vec![5, 1, 2, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
    table
        .row()
        .element(elements::Paragraph::new("Item").styled(bold))
        .element(elements::Paragraph::new("Qty").styled(bold))
        .element(elements::Paragraph::new("Unit price").styled(bold))
        .element(elements::Paragraph::new("Total").styled(bold))
        .push()
        .map_err(|e| InvoiceError::Layout(e.to_string()))?;

    for line in &invoice.lines {
        table
            .row()
            .element(elements::Paragraph::new(line.description.as_str()))
            .element(elements::Paragraph::new(line.quantity.as_str()))
            .element(elements::Paragraph::new(line.unit_price.as_str()))
            .element(elements::Paragraph::new(line.line_total.as_str()))
            .push()
            .map_err(|e| InvoiceError::Layout(e.to_string()))?;
    }
    doc.push(table);
    doc.push(elements::Break::new(1.5));

    let mut subtotal = elements::Paragraph::new(format!("Subtotal: {}", invoice.subtotal));
    subtotal.set_alignment(Alignment::Right);
    doc.push(subtotal);

    let mut total = elements::Paragraph::new(format!("Total: {}", invoice.total));
    total.set_alignment(Alignment::Right);
    doc.push(total.styled(style::Style::new().bold().with_font_size(12)));

    if let Some(notes) = &invoice.notes {
        doc.push(elements::Break::new(2));
        doc.push(elements::Paragraph::new("Notes").styled(bold));
        doc.push(
            elements::Paragraph::new(notes.as_str())
                .styled(style::Style::new().italic().with_font_size(9)),
        );
    }

    let mut buffer = Vec::new();
    doc.render(&mut buffer)
        .map_err(|e| InvoiceError::Render(e.to_string()))?;

    tracing::debug!(number = %invoice.number, bytes = buffer.len(), "Invoice rendered");
    Ok(buffer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use handset_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId};

    use super::*;
    use crate::models::{OrderItem, ShippingDetails};

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            profile_id: None,
            email: Email::parse("kim@example.com").unwrap(),
            shipping: ShippingDetails {
                name: "Kim Lee".into(),
                address: "12 High Street\n\nSpringfield".into(),
                phone: "555-0100".into(),
            },
            status: OrderStatus::Paid,
            subtotal: Decimal::new(219_800, 2),
            total: Decimal::new(219_800, 2),
            notes: Some("  ".into()),
            created_at: Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap(),
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                product_id: Some(ProductId::new(3)),
                title: "Pixel 9".into(),
                unit_price: Decimal::new(109_900, 2),
                quantity: 2,
                line_total: Decimal::new(219_800, 2),
            }],
        }
    }

    #[test]
    fn test_invoice_from_order() {
        let invoice = Invoice::from_order(&order(), "Handset", Currency::Usd);

        assert_eq!(invoice.number, "HS-000042");
        assert_eq!(invoice.date, "March 7, 2026");
        assert_eq!(invoice.status, "Paid");
        assert_eq!(
            invoice.bill_to,
            vec!["Kim Lee", "12 High Street", "Springfield", "555-0100", "kim@example.com"]
        );
        assert_eq!(
            invoice.lines,
            vec![InvoiceLine {
                description: "Pixel 9".into(),
                quantity: "2".into(),
                unit_price: "$1,099.00".into(),
                line_total: "$2,198.00".into(),
            }]
        );
        assert_eq!(invoice.total, "$2,198.00");
        assert!(invoice.notes.is_none(), "blank notes are dropped");
        assert_eq!(invoice.file_name(), "invoice-HS-000042.pdf");
    }

    #[test]
    fn test_missing_fonts_is_an_error() {
        let invoice = Invoice::from_order(&order(), "Handset", Currency::Usd);
        let config = InvoiceConfig {
            font_dir: "/nonexistent/fonts".into(),
            font_name: "Missing".into(),
        };
        assert!(matches!(render(&invoice, &config), Err(InvoiceError::Fonts(_))));
    }
}
