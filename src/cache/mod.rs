//! Cache Module
//!
//! Cache items, expiration policy translation, and the file-backed cache handle.

mod contract;
mod file_handle;
mod item;
mod policy;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use contract::{CacheHandle, RemovedEvent, RemovedListener, RemovedReason};
pub use file_handle::{FileCacheHandle, HandleSettings};
pub use item::{now_utc, CacheItem, ExpirationMode};
pub use policy::{to_native_policy, to_native_policy_at, CachePolicy};
pub use stats::{HandleStats, StatsSnapshot};

pub(crate) use item::offset;
