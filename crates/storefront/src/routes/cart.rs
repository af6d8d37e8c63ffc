//! Cart route handlers.
//!
//! Every response carries the full cart so clients can re-render without a
//! second request. The session holds only the cart namespace; reads on a
//! session without one return an empty cart and do not create a namespace.

use axum::{Json, extract::State};
use larkspur_core::{
    CartError, CartLineItem, CartState, MAX_LINE_QUANTITY, MAX_UNIT_PRICE, ProductId, VariantKey,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::config::PricingConfig;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session::{cart_namespace, ensure_cart_namespace};
use crate::registry::FileCartStore;
use crate::state::AppState;
use crate::summary::{OrderSummary, SummaryView, TotalOverflow};

/// Longest accepted product name.
const MAX_NAME_LENGTH: usize = 255;

// =============================================================================
// Views
// =============================================================================

/// Line item display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub variant_key: String,
    pub product_id: ProductId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub image_url: String,
    pub quantity: u32,
    pub stock_ceiling: u32,
    /// Whether the increase control should be disabled.
    pub at_ceiling: bool,
    pub unit_price: String,
    pub line_price: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u64,
    pub summary: SummaryView,
}

impl CartView {
    /// Build the view of `state` priced with `pricing`.
    ///
    /// # Errors
    ///
    /// Returns [`TotalOverflow`] if a line total or the summary overflows.
    pub fn new(
        state: &CartState,
        pricing: &PricingConfig,
    ) -> std::result::Result<Self, TotalOverflow> {
        let summary = OrderSummary::compute(state, pricing)?;
        let price = |amount: Decimal| larkspur_core::Price::new(amount, pricing.currency).display();

        let items: Vec<CartItemView> = state
            .products
            .iter()
            .map(|item| {
                Ok::<_, TotalOverflow>(CartItemView {
                    variant_key: item.variant_key.to_string(),
                    product_id: item.product_id,
                    name: item.name.clone(),
                    size: item.size.clone(),
                    color: item.color.clone(),
                    image_url: item.image_url.clone(),
                    quantity: item.quantity,
                    stock_ceiling: item.stock_ceiling,
                    at_ceiling: item.at_ceiling(),
                    unit_price: price(item.unit_price),
                    line_price: price(item.line_total().ok_or(TotalOverflow)?),
                })
            })
            .collect::<std::result::Result<_, _>>()?;

        Ok(Self {
            items,
            item_count: state.total_quantity(),
            summary: summary.view(),
        })
    }

    /// View of an empty cart.
    #[must_use]
    pub fn empty(pricing: &PricingConfig) -> Self {
        Self {
            items: Vec::new(),
            item_count: 0,
            summary: OrderSummary::empty(pricing).view(),
        }
    }
}

/// Cart count badge data.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountView {
    pub count: u64,
}

// =============================================================================
// Requests
// =============================================================================

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub variant_key: String,
    pub product_id: i64,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    /// Defaults to 1.
    pub quantity: Option<u32>,
    pub stock_ceiling: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl TryFrom<AddToCartRequest> for CartLineItem {
    type Error = AppError;

    fn try_from(request: AddToCartRequest) -> Result<Self> {
        let variant_key = parse_variant_key(&request.variant_key)?;

        let name = request.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(AppError::BadRequest(format!(
                "name must be 1-{MAX_NAME_LENGTH} characters"
            )));
        }
        if request.unit_price.is_sign_negative() || request.unit_price > MAX_UNIT_PRICE {
            return Err(AppError::BadRequest(format!(
                "unitPrice must be between 0 and {MAX_UNIT_PRICE}"
            )));
        }
        let quantity = request.quantity.unwrap_or(1);
        if quantity > MAX_LINE_QUANTITY || request.stock_ceiling > MAX_LINE_QUANTITY {
            return Err(AppError::BadRequest(format!(
                "quantity and stockCeiling must be at most {MAX_LINE_QUANTITY}"
            )));
        }

        let mut item = Self::new(
            variant_key,
            ProductId::new(request.product_id),
            name,
            request.unit_price,
            request.image_url,
            quantity,
            request.stock_ceiling,
        );
        if let Some(size) = request.size {
            item = item.with_size(size);
        }
        if let Some(color) = request.color {
            item = item.with_color(color);
        }
        Ok(item)
    }
}

/// Request naming a single line item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantKeyRequest {
    pub variant_key: String,
}

fn parse_variant_key(raw: &str) -> Result<VariantKey> {
    VariantKey::parse(raw).map_err(|e| AppError::BadRequest(format!("invalid variantKey: {e}")))
}

// =============================================================================
// Helpers
// =============================================================================

/// Apply `op` to the session's cart and return the resulting view.
///
/// Without a cart namespace nothing is created: the operation sees an empty
/// cart, which every operation except add leaves unchanged.
async fn mutate<F>(state: &AppState, session: &Session, op: F) -> Result<Json<CartView>>
where
    F: FnOnce(&mut FileCartStore) -> std::result::Result<(), CartError> + Send + 'static,
{
    let pricing = &state.config().pricing;
    let Some(namespace) = cart_namespace(session).await? else {
        return Ok(Json(CartView::empty(pricing)));
    };

    let cart = state
        .carts()
        .with_cart(namespace, move |store| {
            op(&mut *store).map(|()| store.state().clone())
        })
        .await??;

    Ok(Json(CartView::new(&cart, pricing)?))
}

async fn current_cart(state: &AppState, session: &Session) -> Result<CartState> {
    match cart_namespace(session).await? {
        Some(namespace) => Ok(state
            .carts()
            .with_cart(namespace, |store| store.state().clone())
            .await?),
        None => Ok(CartState::new()),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = current_cart(&state, &session).await?;
    Ok(Json(CartView::new(&cart, &state.config().pricing)?))
}

/// Cart count badge.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Result<Json<CountView>> {
    let cart = current_cart(&state, &session).await?;
    Ok(Json(CountView {
        count: cart.total_quantity(),
    }))
}

/// Add a line item, merging with an existing item of the same variant.
///
/// Responds 409 with the stock ceiling when the merged quantity would exceed
/// it.
#[instrument(skip(state, session, request), fields(variant_key = %request.variant_key))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let item = CartLineItem::try_from(request)?;
    let namespace = ensure_cart_namespace(&session).await?;

    let quantity = item.quantity.to_string();
    add_breadcrumb(
        "cart",
        "Add to cart",
        Some(&[("variant_key", item.variant_key.as_str()), ("quantity", &quantity)]),
    );

    let cart = state
        .carts()
        .with_cart(namespace, move |store| {
            store.add_to_cart(item).map(|()| store.state().clone())
        })
        .await?
        .inspect_err(|e| tracing::info!(error = %e, "Add to cart rejected"))?;

    Ok(Json(CartView::new(&cart, &state.config().pricing)?))
}

/// Increase a line item's quantity by one.
#[instrument(skip(state, session, request), fields(variant_key = %request.variant_key))]
pub async fn increase(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<VariantKeyRequest>,
) -> Result<Json<CartView>> {
    let key = parse_variant_key(&request.variant_key)?;
    add_breadcrumb("cart", "Increase quantity", Some(&[("variant_key", key.as_str())]));
    mutate(&state, &session, move |store| store.increase_quantity(&key)).await
}

/// Decrease a line item's quantity by one, removing it at 1.
#[instrument(skip(state, session, request), fields(variant_key = %request.variant_key))]
pub async fn decrease(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<VariantKeyRequest>,
) -> Result<Json<CartView>> {
    let key = parse_variant_key(&request.variant_key)?;
    add_breadcrumb("cart", "Decrease quantity", Some(&[("variant_key", key.as_str())]));
    mutate(&state, &session, move |store| {
        store.decrease_quantity(&key);
        Ok(())
    })
    .await
}

/// Remove a line item.
#[instrument(skip(state, session, request), fields(variant_key = %request.variant_key))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<VariantKeyRequest>,
) -> Result<Json<CartView>> {
    let key = parse_variant_key(&request.variant_key)?;
    add_breadcrumb("cart", "Remove from cart", Some(&[("variant_key", key.as_str())]));
    mutate(&state, &session, move |store| {
        store.remove_from_cart(&key);
        Ok(())
    })
    .await
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    add_breadcrumb("cart", "Clear cart", None);
    mutate(&state, &session, |store| {
        store.clear_cart();
        Ok(())
    })
    .await
}
