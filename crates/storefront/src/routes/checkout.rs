//! Checkout handoff route.

use axum::{Json, extract::State};
use larkspur_core::checkout::{CheckoutError, PaymentLinkRequest};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::models::session::cart_namespace;
use crate::state::AppState;

/// Redirect target for the hosted payment page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutView {
    pub url: String,
}

/// Hand the cart off to the payment-link provider.
///
/// The line items are snapshotted and the cart lock released before the
/// provider is called. Once a link exists the checked-out units are taken out
/// of the cart; anything added while the provider was working stays. Any
/// provider failure leaves the cart as it was.
#[instrument(skip(state, session))]
pub async fn create(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let Some(namespace) = cart_namespace(&session).await? else {
        return Err(CheckoutError::EmptyCart.into());
    };

    let request = state
        .carts()
        .with_cart(namespace, |store| PaymentLinkRequest::from_state(store.state()))
        .await??;

    let units = request.total_quantity().to_string();
    add_breadcrumb("checkout", "Creating payment link", Some(&[("units", &units)]));

    let url = state.payments().create_payment_link(&request).await?;

    let remaining = state
        .carts()
        .with_cart(namespace, move |store| store.settle_checkout(&request))
        .await?;
    tracing::info!(%namespace, remaining, "Checkout handed off");

    Ok(Json(CheckoutView { url: url.into() }))
}
