//! Serialization Module
//!
//! Codec contract used when a handle stores its items as bytes.

mod json;

use std::fmt;

use crate::cache::CacheItem;
use crate::error::Result;

pub use json::JsonSerializer;

// == Serializer Kind ==
/// Codecs that can be selected by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerKind {
    Json,
}

impl SerializerKind {
    /// Parses a configuration value. `None` means "store live items".
    pub fn parse(name: &str) -> Option<Option<Self>> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Some(SerializerKind::Json)),
            "" | "none" => Some(None),
            _ => None,
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerKind::Json => f.write_str("json"),
        }
    }
}

// == Cache Serializer Trait ==
/// Encodes a whole cache item, value and metadata, as one unit.
///
/// Failures are reported as [`crate::CacheError::Serialization`] and are
/// never retried.
pub trait CacheSerializer<V>: Send + Sync {
    fn serialize_item(&self, item: &CacheItem<V>) -> Result<Vec<u8>>;

    fn deserialize_item(&self, bytes: &[u8]) -> Result<CacheItem<V>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serializer_kind() {
        assert_eq!(SerializerKind::parse("json"), Some(Some(SerializerKind::Json)));
        assert_eq!(SerializerKind::parse(" JSON "), Some(Some(SerializerKind::Json)));
        assert_eq!(SerializerKind::parse("none"), Some(None));
        assert_eq!(SerializerKind::parse(""), Some(None));
        assert_eq!(SerializerKind::parse("msgpack"), None);
    }
}
