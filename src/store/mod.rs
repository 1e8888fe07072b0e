//! Persistent Store Module
//!
//! The contract the cache handle consumes from its key/value store, plus two
//! bindings of it: a directory tree on disk and an in-process map.
//!
//! The store has no regions of its own; a binding treats the region as a
//! second key dimension so that a region can be flushed on its own.

mod file;
mod memory;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheItem, CachePolicy};
use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Public Constants ==
/// Default size limit (1 GB)
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

/// Interval between store housekeeping sweeps when none is configured
pub const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(20);

// == Stored Value ==
/// Raw value held by the store for one `(key, region)` slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue<V> {
    /// Item encoded by a codec
    Serialized(Vec<u8>),
    /// Live item held as-is
    Item(CacheItem<V>),
}

impl<V> StoredValue<V> {
    /// Approximate footprint in bytes.
    pub fn approximate_size(&self) -> usize {
        match self {
            StoredValue::Serialized(bytes) => bytes.len(),
            StoredValue::Item(item) => {
                std::mem::size_of::<CacheItem<V>>()
                    + item.key().len()
                    + item.region().map_or(0, str::len)
            }
        }
    }

    /// Short label used in log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::Serialized(_) => "serialized bytes",
            StoredValue::Item(_) => "live item",
        }
    }
}

// == Store Config ==
/// Construction-time settings passed through to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the store instance, also the name of its directory
    pub instance_name: String,
    /// Directory the instance directory is created in
    pub base_dir: PathBuf,
    /// Whether the store computes its size when it is opened
    pub calculate_size_on_init: bool,
    /// Minimum time between two housekeeping sweeps
    pub housekeeping_interval: Duration,
}

impl StoreConfig {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            base_dir: PathBuf::from("."),
            calculate_size_on_init: false,
            housekeeping_interval: DEFAULT_HOUSEKEEPING_INTERVAL,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Absolute path of the instance directory.
    ///
    /// A relative base directory is resolved against the working directory.
    pub fn root_dir(&self) -> Result<PathBuf> {
        let base = if self.base_dir.is_absolute() {
            self.base_dir.clone()
        } else {
            env::current_dir()?.join(&self.base_dir)
        };
        Ok(base.join(&self.instance_name))
    }
}

// == Persistent Store Trait ==
/// Key/value store a cache handle persists into.
///
/// Every call is synchronous. Atomicity is per key and per call; nothing
/// spans two calls.
pub trait PersistentStore<V>: Send + Sync {
    /// Checks whether a raw value is stored under `(key, region)`.
    fn contains(&self, key: &str, region: Option<&str>) -> Result<bool>;

    /// Reads the raw value under `(key, region)`.
    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<StoredValue<V>>>;

    /// Stores `value` unless the slot is occupied. Returns whether it was stored.
    fn add(
        &self,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<bool>;

    /// Stores `value`, replacing whatever the slot held.
    fn set(
        &self,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<()>;

    /// Removes the slot, returning its previous raw value.
    fn remove(&self, key: &str, region: Option<&str>) -> Result<Option<StoredValue<V>>>;

    /// Drops one region, or everything when `region` is `None`.
    fn flush(&self, region: Option<&str>) -> Result<()>;

    /// Approximate number of stored values.
    fn item_count(&self) -> Result<u64>;

    /// Configured size limit in bytes.
    fn max_size_bytes(&self) -> u64;
}
