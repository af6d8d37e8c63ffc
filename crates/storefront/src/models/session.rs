//! Session-related types.
//!
//! The session stores nothing but the cart namespace; the cart itself lives in
//! its persisted snapshot.

use tower_sessions::Session;
use uuid::Uuid;

/// Session keys for storefront data.
pub mod keys {
    /// Key for the cart namespace (UUID v4) naming this session's snapshot.
    pub const CART_NAMESPACE: &str = "cart_namespace";
}

/// Cart namespace stored in the session, if any.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn cart_namespace(session: &Session) -> Result<Option<Uuid>, tower_sessions::session::Error> {
    session.get::<Uuid>(keys::CART_NAMESPACE).await
}

/// Cart namespace for this session, minting and storing a new one if needed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn ensure_cart_namespace(session: &Session) -> Result<Uuid, tower_sessions::session::Error> {
    if let Some(namespace) = cart_namespace(session).await? {
        return Ok(namespace);
    }

    let namespace = Uuid::new_v4();
    session.insert(keys::CART_NAMESPACE, namespace).await?;
    tracing::debug!(%namespace, "Assigned cart namespace to session");
    Ok(namespace)
}
