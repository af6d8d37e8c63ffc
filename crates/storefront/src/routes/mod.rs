//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (cart directory writable)
//!
//! # Cart (JSON, full cart view in every response)
//! GET  /cart                   - Cart view (items + order summary)
//! GET  /cart/count             - { count } total quantity
//! POST /cart/add               - Add a line item (409 when over stock)
//! POST /cart/increase          - { variantKey } (409 at the stock ceiling)
//! POST /cart/decrease          - { variantKey }, removes at quantity 1
//! POST /cart/remove            - { variantKey }
//! POST /cart/clear             - Empty the cart
//!
//! # Checkout
//! POST /checkout               - Payment-link handoff, returns { url }
//! ```

pub mod cart;
pub mod checkout;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
};

use crate::middleware::{
    api_rate_limiter, checkout_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/increase", post(cart::increase))
        .route("/decrease", post(cart::decrease))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout::create))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
}

/// Build the application with sessions, request IDs and security headers.
///
/// Rate limiting is left to [`rate_limited_app`], since limiters key on the
/// client address.
pub fn app(state: AppState) -> Router {
    with_middleware(routes(), state)
}

/// [`app`] with per-client rate limits on cart and checkout routes.
pub fn rate_limited_app(state: AppState) -> Router {
    let mut cart = cart_routes();
    if let Some(limiter) = api_rate_limiter() {
        cart = cart.layer(limiter);
    } else {
        tracing::warn!("Cart rate limiter unavailable; serving without it");
    }

    let mut checkout = checkout_routes();
    if let Some(limiter) = checkout_rate_limiter() {
        checkout = checkout.layer(limiter);
    } else {
        tracing::warn!("Checkout rate limiter unavailable; serving without it");
    }

    let routes = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/cart", cart)
        .nest("/checkout", checkout);

    with_middleware(routes, state)
}

fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    routes
        .layer(from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 if the cart directory cannot be created or is not a directory.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let root = state.carts().root().to_path_buf();
    let ready = tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&root).is_ok() && root.is_dir()
    })
    .await
    .unwrap_or(false);

    if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
