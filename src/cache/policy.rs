//! Expiration Policy Module
//!
//! Translates an item's expiration mode into the store-facing policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::item::{now_utc, offset, CacheItem, ExpirationMode};

// == Cache Policy ==
/// Expiration policy handed to the persistent store with every write.
///
/// Absolute and sliding expiration are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Infinite absolute expiration and no sliding expiration
    Never,
    /// Expire at a fixed instant
    AbsoluteAt(DateTime<Utc>),
    /// Expire once the entry goes untouched for this long
    Sliding(Duration),
}

impl CachePolicy {
    /// Absolute instant, if any.
    pub fn absolute_expiration(&self) -> Option<DateTime<Utc>> {
        match self {
            CachePolicy::AbsoluteAt(at) => Some(*at),
            _ => None,
        }
    }

    /// Sliding window, if any.
    pub fn sliding_expiration(&self) -> Option<Duration> {
        match self {
            CachePolicy::Sliding(window) => Some(*window),
            _ => None,
        }
    }

    /// When a store entry last written at `written_at` becomes reclaimable.
    pub fn expires_at(&self, written_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CachePolicy::Never => None,
            CachePolicy::AbsoluteAt(at) => Some(*at),
            CachePolicy::Sliding(window) => offset(written_at, *window),
        }
    }
}

// == Translation ==
/// Builds the store policy for `item` and stamps its last access time.
///
/// This is the only place write-side access bookkeeping happens.
pub fn to_native_policy<V>(item: &mut CacheItem<V>) -> CachePolicy {
    to_native_policy_at(item, now_utc())
}

/// Same as [`to_native_policy`] with an explicit clock reading.
pub fn to_native_policy_at<V>(item: &mut CacheItem<V>, now: DateTime<Utc>) -> CachePolicy {
    let policy = match item.expiration_mode() {
        ExpirationMode::None => CachePolicy::Never,
        ExpirationMode::Absolute => match offset(now, item.expiration_timeout()) {
            Some(at) => CachePolicy::AbsoluteAt(at),
            None => CachePolicy::Never,
        },
        ExpirationMode::Sliding => CachePolicy::Sliding(item.expiration_timeout()),
    };

    item.touch(now);
    policy
}
