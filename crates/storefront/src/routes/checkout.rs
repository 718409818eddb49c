//! Checkout: turns the visitor's cart into a pending order.
//!
//! Payment is out of scope; a placed order starts as `pending` and staff move
//! it along from the dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};
use validator::Validate;

use handset_core::session::Identity;

use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result, add_breadcrumb, first_validation_message};
use crate::filters;
use crate::middleware::{RequireAuth, cart_for};
use crate::models::catalog::non_empty;
use crate::models::{NewOrder, ShippingDetails};
use crate::routes::cart::CartView;
use crate::services::seo::PageMeta;
use crate::state::AppState;
use crate::views::{Layout, Shell, set_flash};

/// Checkout form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

impl CheckoutForm {
    fn prefilled(identity: &Identity) -> Self {
        Self {
            name: identity.full_name.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    fn shipping(&self) -> ShippingDetails {
        ShippingDetails {
            name: self.name.trim().to_owned(),
            address: self.address.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub form: CheckoutForm,
    pub email: String,
    pub error: Option<String>,
}

/// `GET /checkout`. An empty cart goes back to `/cart`.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    shell: Shell,
    session: Session,
) -> Response {
    let items = cart_for(&session, &state).hydrate().await;
    if items.is_empty() {
        return Redirect::to("/cart").into_response();
    }

    CheckoutTemplate {
        layout: shell.layout_with(&state, PageMeta::new("Checkout").noindex()),
        cart: CartView::new(&items, state.config().currency),
        form: CheckoutForm::prefilled(&identity),
        email: identity.email.as_str().to_owned(),
        error: None,
    }
    .into_response()
}

/// `POST /checkout`
///
/// Writes the order from the reconciled cart, empties the cart and lands on
/// the order page.
#[instrument(skip_all)]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    shell: Shell,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let store = cart_for(&session, &state);
    let items = store.hydrate().await;
    if items.is_empty() {
        set_flash(&session, "Your cart is empty.").await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let shipping = form.shipping();
    if let Err(errors) = shipping.validate() {
        return Ok(CheckoutTemplate {
            layout: shell.layout_with(&state, PageMeta::new("Checkout").noindex()),
            cart: CartView::new(&items, state.config().currency),
            email: identity.email.as_str().to_owned(),
            error: Some(first_validation_message(&errors)),
            form,
        }
        .into_response());
    }

    let new_order = NewOrder {
        profile_id: identity.id,
        email: identity.email.clone(),
        shipping,
        notes: non_empty(&form.notes),
        items,
    };
    let order = OrderRepository::new(state.pool())
        .create(&new_order)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(msg) => AppError::BadRequest(msg),
            other => AppError::Database(other),
        })?;

    store.clear().await;
    let number = order.number();
    add_breadcrumb("checkout", "Order placed", Some(&[("order", number.as_str())]));
    info!(order = %number, user_id = %identity.id, total = %order.total, "Order placed");
    set_flash(&session, format!("Thanks! Order {number} has been placed.")).await;

    Ok(Redirect::to(&format!("/account/orders/{}", order.id)).into_response())
}
