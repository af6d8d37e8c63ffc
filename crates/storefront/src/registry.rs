//! Per-session cart stores.
//!
//! Every session owns one [`CartStore`] named by a cart namespace (a UUID kept
//! in the session). Stores are cached in memory with `moka` and evicted after
//! a period of inactivity; an evicted store is reopened from its snapshot on
//! the next request.
//!
//! Cart operations are synchronous and touch the filesystem, so they run on
//! the blocking pool. The per-store mutex is never held across an `.await`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use larkspur_core::CartStore;
use moka::future::Cache;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::JsonFileStorage;

/// Maximum number of stores kept in memory.
const MAX_CACHED_CARTS: u64 = 10_000;

/// Idle time after which a store is dropped from memory.
const CART_IDLE_SECONDS: u64 = 30 * 60;

/// Cart store backed by a snapshot file.
pub type FileCartStore = CartStore<JsonFileStorage>;

type CartSlot = Arc<Mutex<Option<FileCartStore>>>;

/// Errors reaching a session's cart.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another request panicked while holding the cart.
    #[error("cart lock poisoned for {0}")]
    Poisoned(Uuid),

    /// The blocking task running the cart operation failed.
    #[error("cart task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Owner of every live cart store.
#[derive(Clone)]
pub struct CartRegistry {
    inner: Arc<CartRegistryInner>,
}

struct CartRegistryInner {
    root: PathBuf,
    strict_first_insert: bool,
    slots: Cache<Uuid, CartSlot>,
}

impl CartRegistry {
    /// Create a registry storing snapshots under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, strict_first_insert: bool) -> Self {
        let slots = Cache::builder()
            .max_capacity(MAX_CACHED_CARTS)
            .time_to_idle(Duration::from_secs(CART_IDLE_SECONDS))
            .build();

        Self {
            inner: Arc::new(CartRegistryInner {
                root: root.into(),
                strict_first_insert,
                slots,
            }),
        }
    }

    /// Directory holding cart snapshots.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.inner.root
    }

    /// Run `f` against the cart of `namespace`, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart lock is poisoned or the blocking task
    /// fails. Rejections from the cart itself are part of `T`.
    pub async fn with_cart<F, T>(&self, namespace: Uuid, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut FileCartStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let slot = self
            .inner
            .slots
            .get_with(namespace, async { Arc::new(Mutex::new(None)) })
            .await;
        let root = self.inner.root.clone();
        let strict = self.inner.strict_first_insert;

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| RegistryError::Poisoned(namespace))?;
            let store = guard.get_or_insert_with(|| open_store(&root, namespace, strict));
            Ok(f(store))
        })
        .await?
    }
}

fn open_store(root: &std::path::Path, namespace: Uuid, strict: bool) -> FileCartStore {
    // Hyphenated UUIDs always pass namespace validation.
    let storage = JsonFileStorage::new(root, &namespace.to_string())
        .unwrap_or_else(|_| JsonFileStorage::at(root.join(format!("{namespace}.json"))));
    tracing::debug!(%namespace, path = %storage.path().display(), "Opening cart store");
    CartStore::open(storage).with_strict_first_insert(strict)
}
