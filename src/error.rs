//! Error types for the cache handle
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache handle.
///
/// A missing key is never an error; lookups return `Option` or `bool`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Codec could not encode or decode an item, or the stored raw value
    /// does not have the shape this handle expects
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// The persistent store failed an operation
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Handle or store configuration was rejected at construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A cache item failed validation
    #[error("Invalid item: {0}")]
    InvalidItem(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::StoreUnavailable(err.to_string())
    }
}

impl From<walkdir::Error> for CacheError {
    fn from(err: walkdir::Error) -> Self {
        CacheError::StoreUnavailable(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache handle.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_store_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::StoreUnavailable(ref msg) if msg.contains("read-only")));
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
