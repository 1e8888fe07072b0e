//! Cache Item Module
//!
//! Defines the unit of storage: a value plus its expiration metadata and
//! access timestamps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Expiration Mode ==
/// How an item expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationMode {
    /// Never self-expires
    None,
    /// Expires a fixed timeout after it was written
    Absolute,
    /// Expires a timeout after it was last written or read
    Sliding,
}

// == Cache Item ==
/// A value stored under `(key, region)` together with its expiration metadata.
///
/// The whole item, metadata included, is what a codec serializes, so a
/// deserialized item is complete without asking the store for anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem<V> {
    key: String,
    region: Option<String>,
    value: V,
    expiration_mode: ExpirationMode,
    expiration_timeout: Duration,
    created_utc: DateTime<Utc>,
    last_accessed_utc: DateTime<Utc>,
    uses_expiration_defaults: bool,
}

impl<V> CacheItem<V> {
    // == Constructors ==
    /// Creates an item in the default region that inherits the handle's
    /// default expiration.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        let now = now_utc();
        Self {
            key: key.into(),
            region: None,
            value,
            expiration_mode: ExpirationMode::None,
            expiration_timeout: Duration::ZERO,
            created_utc: now,
            last_accessed_utc: now,
            uses_expiration_defaults: true,
        }
    }

    /// Creates an item inside `region`.
    pub fn in_region(key: impl Into<String>, region: impl Into<String>, value: V) -> Self {
        let mut item = Self::new(key, value);
        item.region = Some(region.into());
        item
    }

    /// Sets an explicit expiration, overriding the handle's default.
    pub fn with_expiration(mut self, mode: ExpirationMode, timeout: Duration) -> Self {
        self.expiration_mode = mode;
        self.expiration_timeout = if mode == ExpirationMode::None {
            Duration::ZERO
        } else {
            timeout
        };
        self.uses_expiration_defaults = false;
        self
    }

    /// Returns a copy carrying `value` with the same key, region and expiration.
    pub fn with_value<U>(&self, value: U) -> CacheItem<U> {
        CacheItem {
            key: self.key.clone(),
            region: self.region.clone(),
            value,
            expiration_mode: self.expiration_mode,
            expiration_timeout: self.expiration_timeout,
            created_utc: self.created_utc,
            last_accessed_utc: self.last_accessed_utc,
            uses_expiration_defaults: self.uses_expiration_defaults,
        }
    }

    // == Accessors ==
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn expiration_mode(&self) -> ExpirationMode {
        self.expiration_mode
    }

    pub fn expiration_timeout(&self) -> Duration {
        self.expiration_timeout
    }

    pub fn created_utc(&self) -> DateTime<Utc> {
        self.created_utc
    }

    pub fn last_accessed_utc(&self) -> DateTime<Utc> {
        self.last_accessed_utc
    }

    /// True until an explicit expiration is set with [`CacheItem::with_expiration`].
    pub fn uses_expiration_defaults(&self) -> bool {
        self.uses_expiration_defaults
    }

    // == Expiration ==
    /// Instant after which the item is stale, or `None` if it never expires.
    ///
    /// Both absolute and sliding items count from `last_accessed_utc`: the
    /// policy translator stamps it on every write, and sliding reads rewrite
    /// the item.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.expiration_mode {
            ExpirationMode::None => None,
            ExpirationMode::Absolute | ExpirationMode::Sliding => {
                offset(self.last_accessed_utc, self.expiration_timeout)
            }
        }
    }

    /// Checks whether the item is stale right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_utc())
    }

    /// Checks whether the item is stale at `now`.
    ///
    /// Boundary condition: an item is expired once `now` reaches its expiry
    /// instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Validation ==
    /// Rejects empty keys, empty region names and zero timeouts on expiring items.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(CacheError::InvalidItem(
                "key must not be empty".to_string(),
            ));
        }

        if matches!(self.region.as_deref(), Some(region) if region.trim().is_empty()) {
            return Err(CacheError::InvalidItem(format!(
                "region of key '{}' must not be empty",
                self.key
            )));
        }

        if self.expiration_mode != ExpirationMode::None && self.expiration_timeout.is_zero() {
            return Err(CacheError::InvalidItem(format!(
                "expiration timeout of key '{}' must be greater than zero",
                self.key
            )));
        }

        Ok(())
    }

    // == Crate-internal Mutation ==
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_utc = now;
    }

    pub(crate) fn apply_default_expiration(&mut self, mode: ExpirationMode, timeout: Duration) {
        if self.uses_expiration_defaults {
            self.expiration_mode = mode;
            self.expiration_timeout = timeout;
        }
    }
}

// == Utility Functions ==
/// Returns the current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Adds a std duration to an instant; `None` when the result is out of range,
/// which callers treat as "never".
pub(crate) fn offset(start: DateTime<Utc>, by: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
}
