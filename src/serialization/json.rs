//! JSON codec built on serde_json.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheItem;
use crate::error::Result;
use crate::serialization::CacheSerializer;

/// Stores items as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl<V> CacheSerializer<V> for JsonSerializer
where
    V: Serialize + DeserializeOwned,
{
    fn serialize_item(&self, item: &CacheItem<V>) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(item)?)
    }

    fn deserialize_item(&self, bytes: &[u8]) -> Result<CacheItem<V>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
