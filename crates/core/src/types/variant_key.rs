//! Variant key type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`VariantKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VariantKeyError {
    /// The input string is empty.
    #[error("variant key cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("variant key must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace or control characters.
    #[error("variant key cannot contain whitespace or control characters")]
    InvalidCharacter,
}

/// Identifier of a purchasable unit: the price reference of one product
/// variant (e.g. `price_1NqXyZ2eZvKYlo2C`).
///
/// A cart holds at most one line item per key.
///
/// ## Constraints
///
/// - Length: 1-255 characters
/// - No whitespace or control characters
///
/// ## Examples
///
/// ```
/// use larkspur_core::VariantKey;
///
/// assert!(VariantKey::parse("price_123").is_ok());
///
/// assert!(VariantKey::parse("").is_err());
/// assert!(VariantKey::parse("price 123").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct VariantKey(String);

impl VariantKey {
    /// Maximum length of a variant key.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `VariantKey` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 255 characters,
    /// or contains whitespace or control characters.
    pub fn parse(s: &str) -> Result<Self, VariantKeyError> {
        if s.is_empty() {
            return Err(VariantKeyError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(VariantKeyError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(VariantKeyError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for VariantKey {
    type Err = VariantKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VariantKey {
    type Error = VariantKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VariantKey> for String {
    fn from(key: VariantKey) -> Self {
        key.0
    }
}

impl AsRef<str> for VariantKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_keys() {
        assert!(VariantKey::parse("price_1NqXyZ2eZvKYlo2C").is_ok());
        assert!(VariantKey::parse("A").is_ok());
        assert!(VariantKey::parse("sku-42/blue/xl").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(VariantKey::parse(""), Err(VariantKeyError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "k".repeat(256);
        assert!(matches!(
            VariantKey::parse(&long),
            Err(VariantKeyError::TooLong { max: 255 })
        ));
        assert!(VariantKey::parse(&"k".repeat(255)).is_ok());
    }

    #[test]
    fn test_parse_rejects_whitespace() {
        assert_eq!(
            VariantKey::parse("price 1"),
            Err(VariantKeyError::InvalidCharacter)
        );
        assert_eq!(
            VariantKey::parse("price\n"),
            Err(VariantKeyError::InvalidCharacter)
        );
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let key: VariantKey = serde_json::from_str("\"price_1\"").unwrap();
        assert_eq!(key.as_str(), "price_1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"price_1\"");

        assert!(serde_json::from_str::<VariantKey>("\"\"").is_err());
    }

    #[test]
    fn test_from_str() {
        let key: VariantKey = "price_9".parse().unwrap();
        assert_eq!(key.to_string(), "price_9");
    }
}
