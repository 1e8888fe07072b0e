//! File Cache Handle - a persistent tier for multi-tier caches
//!
//! Stores cache items in a persistent key/value store with absolute and
//! sliding expiration enforced at read time and optional item serialization.

pub mod cache;
pub mod config;
pub mod error;
pub mod serialization;
pub mod store;

pub use cache::{CacheHandle, CacheItem, ExpirationMode, FileCacheHandle};
pub use config::HandleConfig;
pub use error::{CacheError, Result};
