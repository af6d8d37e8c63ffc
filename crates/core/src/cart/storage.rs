//! Persistence seam for cart snapshots.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::CartState;

/// Name of the record a cart snapshot is stored under.
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The record name cannot be used by this backend.
    #[error("invalid record name: {0:?}")]
    InvalidName(String),

    /// The backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of a single cart snapshot.
///
/// The store calls [`save`](CartStorage::save) synchronously after every
/// mutation that changed the cart and [`load`](CartStorage::load) once when
/// it is opened.
pub trait CartStorage {
    /// Read the persisted snapshot. `Ok(None)` means nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read or decoded.
    fn load(&self) -> Result<Option<CartState>, StorageError>;

    /// Replace the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, state: &CartState) -> Result<(), StorageError>;
}

impl<T: CartStorage + ?Sized> CartStorage for &T {
    fn load(&self) -> Result<Option<CartState>, StorageError> {
        (**self).load()
    }

    fn save(&self, state: &CartState) -> Result<(), StorageError> {
        (**self).save(state)
    }
}

/// In-process snapshot storage.
///
/// Holds the serialized JSON document, so a load goes through the same
/// decoding path as a durable backend. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<MemoryStorageInner>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
    record: Mutex<Option<String>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a raw snapshot document.
    #[must_use]
    pub fn with_record(json: impl Into<String>) -> Self {
        let storage = Self::default();
        if let Ok(mut record) = storage.inner.record.lock() {
            *record = Some(json.into());
        }
        storage
    }

    /// The raw snapshot document, if one has been written.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.inner
            .record
            .lock()
            .ok()
            .and_then(|record| record.clone())
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self) -> Result<Option<CartState>, StorageError> {
        let record = self
            .inner
            .record
            .lock()
            .map_err(|_| StorageError::Unavailable("record lock poisoned".to_string()))?;

        record
            .as_deref()
            .map(CartState::from_json)
            .transpose()
            .map_err(StorageError::from)
    }

    fn save(&self, state: &CartState) -> Result<(), StorageError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }

        let json = state.to_json()?;
        let mut record = self
            .inner
            .record
            .lock()
            .map_err(|_| StorageError::Unavailable("record lock poisoned".to_string()))?;
        *record = Some(json);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
