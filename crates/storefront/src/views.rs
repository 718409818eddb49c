//! Display data shared by page templates.
//!
//! Templates never format money or dates themselves; handlers build these
//! view structs with everything pre-rendered as strings.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tower_sessions::Session;
use tracing::warn;

use handset_core::cart;
use handset_core::{Currency, Money};

use crate::error::AppError;
use crate::middleware::{CspNonce, RequestSession, cart_for, request_uri};
use crate::models::{Paginated, Product, session_keys};
use crate::services::seo::PageMeta;
use crate::state::AppState;

#[must_use]
pub fn money(amount: Decimal, currency: Currency) -> String {
    Money::new(amount, currency).to_string()
}

/// `Mar 4, 2026`
#[must_use]
pub fn short_date(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

/// `Mar 4, 2026 14:05`
#[must_use]
pub fn date_time(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y %H:%M").to_string()
}

/// Queue a one-shot notice for the next rendered page.
pub async fn set_flash(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(session_keys::FLASH, message.into()).await {
        warn!(error = %e, "Failed to store flash message");
    }
}

pub(crate) async fn take_flash(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::FLASH)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read flash message");
            None
        })
}

// =============================================================================
// Page shell
// =============================================================================

/// Per-request data every storefront page needs: nonce, nav state, flash.
pub struct Shell {
    nonce: String,
    path: String,
    user_name: Option<String>,
    is_staff: bool,
    cart_count: u64,
    flash: Option<String>,
}

impl FromRequestParts<AppState> for Shell {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let resolved = RequestSession::from_request_parts(parts, state).await?;
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let profile = resolved.resolver().current_profile().await;
        let user_name = match profile {
            Some(profile) => Some(profile.display_name().to_owned()),
            None => resolved
                .resolver()
                .current_user()
                .await
                .map(|identity| identity.email.as_str().to_owned()),
        };

        // The badge shows the stored count; reconciliation happens on /cart.
        let cart_count = cart::count(&cart_for(&session, state).load().await);

        Ok(Self {
            nonce,
            path: request_uri(parts).path().to_owned(),
            user_name,
            is_staff: profile.is_some_and(|p| p.role.is_staff()),
            cart_count,
            flash: take_flash(&session).await,
        })
    }
}

impl Shell {
    /// Resolve meta overrides for this path and build the layout.
    pub async fn layout(self, state: &AppState, defaults: PageMeta) -> Layout {
        let meta = state.seo().page_meta(state.pool(), &self.path, defaults).await;
        self.layout_with(state, meta)
    }

    /// Build the layout without consulting stored meta tags.
    #[must_use]
    pub fn layout_with(self, state: &AppState, meta: PageMeta) -> Layout {
        let config = state.config();
        let canonical_url = meta
            .canonical_url
            .clone()
            .unwrap_or_else(|| config.absolute_url(&self.path));

        Layout {
            site_name: config.site_name.clone(),
            title: meta.full_title(&config.site_name),
            description: meta.description,
            keywords: meta.keywords,
            og_image: meta.og_image,
            canonical_url,
            noindex: meta.noindex,
            json_ld: meta.json_ld,
            nonce: self.nonce,
            path: self.path,
            user_name: self.user_name,
            is_staff: self.is_staff,
            cart_count: self.cart_count,
            flash: self.flash,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Everything `base.html` renders outside the page body.
pub struct Layout {
    pub site_name: String,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
    pub canonical_url: String,
    pub noindex: bool,
    /// Pre-serialized, `<`-escaped JSON-LD documents.
    pub json_ld: Vec<String>,
    pub nonce: String,
    pub path: String,
    pub user_name: Option<String>,
    pub is_staff: bool,
    pub cart_count: u64,
    pub flash: Option<String>,
}

impl Layout {
    /// `true` when the nav link for `prefix` should be highlighted.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

// =============================================================================
// Shared views
// =============================================================================

/// Product tile used on listings, home, favourites and related products.
#[derive(Clone, Debug)]
pub struct ProductCard {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub brand: Option<String>,
    pub image: Option<String>,
    /// Price charged.
    pub price: String,
    /// Struck-through price when discounted.
    pub compare_at_price: Option<String>,
    pub discount_percent: Option<u32>,
    pub in_stock: bool,
    pub is_favourite: bool,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, currency: Currency, is_favourite: bool) -> Self {
        let (unit_price, sale_price) = product.catalog_entry().pricing();
        let (price, compare_at_price) = match sale_price {
            Some(sale) => (sale, Some(unit_price)),
            None => (unit_price, None),
        };

        Self {
            id: product.id.get(),
            slug: product.slug.to_string(),
            title: product.title.clone(),
            brand: product.brand.clone(),
            image: product.featured_image.clone(),
            price: money(price, currency),
            compare_at_price: compare_at_price.map(|p| money(p, currency)),
            discount_percent: product.discount_percent(),
            in_stock: product.in_stock(),
            is_favourite,
        }
    }

    /// Cards for `products`, marking those whose id is in `favourites`.
    #[must_use]
    pub fn list(
        products: &[Product],
        currency: Currency,
        favourites: &[handset_core::ProductId],
    ) -> Vec<Self> {
        products
            .iter()
            .map(|p| Self::new(p, currency, favourites.contains(&p.id)))
            .collect()
    }
}

/// Previous/next links for a paginated listing.
#[derive(Clone, Debug, Default)]
pub struct PaginationView {
    pub page: u32,
    pub total_pages: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl PaginationView {
    #[must_use]
    pub fn new<T>(page: &Paginated<T>, href_for: impl Fn(u32) -> String) -> Self {
        Self {
            page: page.page,
            total_pages: page.total_pages(),
            prev_href: page.has_prev().then(|| href_for(page.page - 1)),
            next_href: page.has_next().then(|| href_for(page.page + 1)),
        }
    }

    #[must_use]
    pub const fn is_single_page(&self) -> bool {
        self.total_pages <= 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use handset_core::{ProductId, ProductStatus, Slug};

    use super::*;

    fn product(price: i64, compare_at: Option<i64>, on_sale: bool) -> Product {
        Product {
            id: ProductId::new(3),
            title: "Pixel 9".into(),
            slug: Slug::parse("pixel-9").unwrap(),
            brand: Some("Google".into()),
            category_id: None,
            description: String::new(),
            price: Decimal::new(price, 0),
            compare_at_price: compare_at.map(|c| Decimal::new(c, 0)),
            on_sale,
            featured_image: None,
            stock_quantity: 0,
            is_featured: false,
            status: ProductStatus::Published,
            meta_title: None,
            meta_description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_card_shows_sale_price_with_compare_at() {
        let card = ProductCard::new(&product(799, Some(899), true), Currency::Usd, true);
        assert_eq!(card.price, "$799.00");
        assert_eq!(card.compare_at_price.as_deref(), Some("$899.00"));
        assert_eq!(card.discount_percent, Some(11));
        assert!(!card.in_stock);
        assert!(card.is_favourite);
    }

    #[test]
    fn test_card_ignores_compare_at_when_not_on_sale() {
        let card = ProductCard::new(&product(799, Some(899), false), Currency::Usd, false);
        assert_eq!(card.price, "$799.00");
        assert_eq!(card.compare_at_price, None);
    }

    #[test]
    fn test_pagination_links() {
        let page = Paginated::<()> { items: vec![], page: 2, per_page: 12, total: 30 };
        let view = PaginationView::new(&page, |p| format!("?page={p}"));
        assert_eq!(view.prev_href.as_deref(), Some("?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("?page=3"));
        assert!(!view.is_single_page());
    }

    #[test]
    fn test_dates() {
        let at = DateTime::parse_from_rfc3339("2026-03-04T14:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(short_date(&at), "Mar 4, 2026");
        assert_eq!(date_time(&at), "Mar 4, 2026 14:05");
    }
}
