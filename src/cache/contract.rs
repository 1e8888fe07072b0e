//! Cache Handle Contract
//!
//! The interface a multi-tier cache manager drives each of its tiers through.

use crate::cache::{CacheItem, StatsSnapshot};
use crate::error::Result;

// == Removal Notification ==
/// Why a handle removed an item on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RemovedReason {
    /// The item was found stale on read
    Expired,
}

/// Fired when a handle removes an item without being asked to.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEvent<V> {
    pub key: String,
    pub region: Option<String>,
    pub reason: RemovedReason,
    pub value: V,
}

/// Callback receiving [`RemovedEvent`]s.
pub type RemovedListener<V> = Box<dyn Fn(&RemovedEvent<V>) + Send + Sync>;

// == Cache Handle Trait ==
/// One cache tier.
///
/// A missing key is `Ok(None)` / `Ok(false)`; errors are store or codec
/// failures and reach the caller unchanged.
pub trait CacheHandle<V>: Send + Sync {
    /// Name of the cache instance behind this handle.
    fn name(&self) -> &str;

    /// Stores `item` unless its `(key, region)` slot is taken.
    fn add(&self, item: CacheItem<V>) -> Result<bool>;

    /// Reads a live item. Stale items are removed and reported as missing.
    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>>;

    /// Stores `item`, replacing whatever the slot held.
    fn put(&self, item: CacheItem<V>) -> Result<()>;

    /// Removes a slot. Returns whether anything was removed.
    fn remove(&self, key: &str, region: Option<&str>) -> Result<bool>;

    /// Checks whether the store holds the slot.
    fn exists(&self, key: &str, region: Option<&str>) -> Result<bool>;

    /// Removes every item in every region.
    fn clear(&self) -> Result<()>;

    /// Removes every item in `region` only.
    fn clear_region(&self, region: &str) -> Result<()>;

    /// Approximate number of stored items.
    fn count(&self) -> Result<usize>;

    /// Events counted so far.
    fn stats(&self) -> StatsSnapshot;
}
