//! JSON file backend for cart snapshots.
//!
//! Each cart namespace gets its own directory holding a single
//! `cart-storage.json` record. Writes go to a temporary file that is renamed
//! over the record, so a reader never sees a half-written snapshot.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use larkspur_core::cart::{CART_STORAGE_KEY, CartState, CartStorage, StorageError};
use tracing::debug;

/// Longest namespace accepted as a directory name.
const MAX_NAMESPACE_LENGTH: usize = 64;

/// Cart snapshot stored as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage for `namespace` under `root` (`<root>/<namespace>/cart-storage.json`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] unless the namespace is 1-64
    /// ASCII letters, digits, `-` or `_`.
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Result<Self, StorageError> {
        validate_namespace(namespace)?;
        Ok(Self {
            path: root
                .as_ref()
                .join(namespace)
                .join(format!("{CART_STORAGE_KEY}.json")),
        })
    }

    /// Storage at an explicit file path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CartStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<CartState>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(CartState::from_json(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &CartState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, state.to_json()?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), items = state.len(), "Wrote cart snapshot");
        Ok(())
    }
}

fn validate_namespace(namespace: &str) -> Result<(), StorageError> {
    let valid = !namespace.is_empty()
        && namespace.len() <= MAX_NAMESPACE_LENGTH
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(namespace.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use larkspur_core::cart::CartLineItem;
    use larkspur_core::{ProductId, VariantKey};
    use rust_decimal::Decimal;

    use super::*;

    fn state() -> CartState {
        let item = |k: &str, quantity| {
            CartLineItem::new(
                VariantKey::parse(k).unwrap(),
                ProductId::new(9),
                "Canvas Tote",
                Decimal::new(3200, 2),
                "https://cdn.example.com/tote.jpg",
                quantity,
                8,
            )
        };
        CartState {
            products: vec![item("price_b", 2), item("price_a", 1).with_color("Rust")],
        }
    }

    #[test]
    fn test_missing_record_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path(), "session-1").unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_namespace_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path(), "session-1").unwrap();

        storage.save(&state()).unwrap();

        assert_eq!(
            storage.path(),
            dir.path().join("session-1").join("cart-storage.json")
        );
        assert!(storage.path().is_file());
        assert!(!storage.temp_path().exists());
        assert_eq!(storage.load().unwrap(), Some(state()));
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::at(dir.path().join("cart.json"));

        storage.save(&state()).unwrap();
        storage.save(&CartState::new()).unwrap();

        assert_eq!(
            fs::read_to_string(storage.path()).unwrap(),
            "{\"products\":[]}"
        );
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::at(dir.path().join("cart.json"));
        fs::write(storage.path(), "{").unwrap();

        assert!(matches!(storage.load(), Err(StorageError::Serialize(_))));
    }

    #[test]
    fn test_namespace_validation() {
        let dir = tempfile::tempdir().unwrap();
        let too_long = "n".repeat(65);
        for bad in ["", "../escape", "a/b", "with space", too_long.as_str()] {
            assert!(
                matches!(
                    JsonFileStorage::new(dir.path(), bad),
                    Err(StorageError::InvalidName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(JsonFileStorage::new(dir.path(), "0b9f-4c_x").is_ok());
    }
}
