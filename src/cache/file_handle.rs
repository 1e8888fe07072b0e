//! File Cache Handle Module
//!
//! Cache tier backed by a persistent store. Adds read-time expiration on top
//! of the store's coarse housekeeping and bridges items through an optional
//! codec.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{
    to_native_policy, CacheHandle, CacheItem, ExpirationMode, HandleStats, RemovedEvent,
    RemovedListener, RemovedReason, StatsSnapshot,
};
use crate::config::HandleConfig;
use crate::error::{CacheError, Result};
use crate::serialization::{CacheSerializer, JsonSerializer, SerializerKind};
use crate::store::{FileStore, PersistentStore, StoredValue};

// == Handle Settings ==
/// Store settings as seen through the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleSettings {
    /// Store size limit in megabytes
    pub memory_limit_megabytes: u64,
    /// Interval between store housekeeping sweeps
    pub housekeeping_interval: Duration,
    /// Whether the store computes its size when opened
    pub calculate_size_on_init: bool,
}

// == File Cache Handle ==
/// Cache handle persisting items into a [`PersistentStore`].
///
/// Holds no locks of its own: concurrent callers get whatever per-key
/// atomicity the store provides. The store reference, codec and listeners
/// are fixed once the handle is shared.
pub struct FileCacheHandle<V> {
    config: HandleConfig,
    store: Arc<dyn PersistentStore<V>>,
    serializer: Option<Arc<dyn CacheSerializer<V>>>,
    stats: HandleStats,
    listeners: Vec<RemovedListener<V>>,
}

impl<V> FileCacheHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a handle storing live items.
    ///
    /// Fails if the configuration names a serializer, since none is supplied.
    pub fn new(config: HandleConfig, store: Arc<dyn PersistentStore<V>>) -> Result<Self> {
        if let Some(kind) = config.serializer {
            return Err(CacheError::Configuration(format!(
                "serializer '{}' requested but none supplied",
                kind
            )));
        }
        Self::build(config, store, None)
    }

    /// Creates a handle that stores items encoded by `serializer`.
    pub fn with_serializer(
        config: HandleConfig,
        store: Arc<dyn PersistentStore<V>>,
        serializer: Arc<dyn CacheSerializer<V>>,
    ) -> Result<Self> {
        Self::build(config, store, Some(serializer))
    }

    fn build(
        config: HandleConfig,
        store: Arc<dyn PersistentStore<V>>,
        serializer: Option<Arc<dyn CacheSerializer<V>>>,
    ) -> Result<Self> {
        config.validate()?;

        let store_config = config.store_config();
        info!(
            "Cache handle '{}' ready (serializer: {}, housekeeping every {:?})",
            store_config.instance_name,
            if serializer.is_some() { "yes" } else { "no" },
            store_config.housekeeping_interval
        );

        Ok(Self {
            config,
            store,
            serializer,
            stats: HandleStats::new(),
            listeners: Vec::new(),
        })
    }

    /// Registers a callback for items the handle removes on its own.
    ///
    /// Takes `&mut self`, so listeners are wired before the handle is shared.
    pub fn on_removed<F>(&mut self, listener: F)
    where
        F: Fn(&RemovedEvent<V>) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    // == Accessors ==
    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore<V>> {
        &self.store
    }

    pub fn has_serializer(&self) -> bool {
        self.serializer.is_some()
    }

    /// Store settings, with the size limit reported in megabytes.
    pub fn settings(&self) -> HandleSettings {
        let store_config = self.config.store_config();
        HandleSettings {
            memory_limit_megabytes: self.store.max_size_bytes() / 1024 / 1024,
            housekeeping_interval: store_config.housekeeping_interval,
            calculate_size_on_init: store_config.calculate_size_on_init,
        }
    }

    // == Serialization Bridge ==
    fn encode(&self, item: CacheItem<V>) -> Result<StoredValue<V>> {
        match &self.serializer {
            Some(codec) => Ok(StoredValue::Serialized(codec.serialize_item(&item)?)),
            None => Ok(StoredValue::Item(item)),
        }
    }

    fn decode(&self, key: &str, raw: StoredValue<V>) -> Result<CacheItem<V>> {
        match (&self.serializer, raw) {
            (Some(codec), StoredValue::Serialized(bytes)) => codec.deserialize_item(&bytes),
            (None, StoredValue::Item(item)) => Ok(item),
            (serializer, other) => {
                let expected = if serializer.is_some() {
                    "serialized bytes"
                } else {
                    "live item"
                };
                warn!(
                    "Key '{}' holds {} but this handle expects {}",
                    key,
                    other.kind(),
                    expected
                );
                Err(CacheError::Serialization(format!(
                    "key '{}' holds {}, expected {}",
                    key,
                    other.kind(),
                    expected
                )))
            }
        }
    }

    // == Item Preparation ==
    fn prepare(&self, item: &mut CacheItem<V>) -> Result<()> {
        if let Some((mode, timeout)) = self.config.default_expiration {
            item.apply_default_expiration(mode, timeout);
        }
        item.validate()
    }

    fn write(&self, mut item: CacheItem<V>, overwrite: bool) -> Result<bool> {
        let policy = to_native_policy(&mut item);
        let key = item.key().to_string();
        let region = item.region().map(str::to_string);
        let raw = self.encode(item)?;

        if overwrite {
            self.store.set(&key, raw, &policy, region.as_deref())?;
            Ok(true)
        } else {
            self.store.add(&key, raw, &policy, region.as_deref())
        }
    }

    fn notify(&self, event: RemovedEvent<V>) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    fn lookup(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        let raw = match self.store.get(key, region)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let mut item = self.decode(key, raw)?;

        // Store housekeeping is coarse, so staleness is decided here.
        if item.is_expired() {
            self.store.remove(key, region)?;
            self.stats.record_expired();
            debug!("Key '{}' expired, removed on read", key);

            self.notify(RemovedEvent {
                key: key.to_string(),
                region: region.map(str::to_string),
                reason: RemovedReason::Expired,
                value: item.into_value(),
            });
            return Ok(None);
        }

        if item.expiration_mode() == ExpirationMode::Sliding {
            // Rewriting restarts the sliding window; last writer wins.
            let policy = to_native_policy(&mut item);
            let raw = self.encode(item.clone())?;
            self.store.set(key, raw, &policy, region)?;
            debug!("Refreshed sliding expiration of key '{}'", key);
        }

        Ok(Some(item))
    }
}

impl<V> FileCacheHandle<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Creates a handle, resolving the configured serializer by name.
    pub fn from_config(config: HandleConfig, store: Arc<dyn PersistentStore<V>>) -> Result<Self> {
        let serializer: Option<Arc<dyn CacheSerializer<V>>> = match config.serializer {
            Some(SerializerKind::Json) => Some(Arc::new(JsonSerializer::new())),
            None => None,
        };
        Self::build(config, store, serializer)
    }

    /// Opens the file store for `config` and binds a handle to it.
    ///
    /// Items written by an earlier handle over the same directory are
    /// visible to the new one.
    pub fn open(config: HandleConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn PersistentStore<V>> =
            Arc::new(FileStore::<V>::open(config.store_config())?);
        Self::from_config(config, store)
    }
}

impl<V> CacheHandle<V> for FileCacheHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.config.effective_name()
    }

    // == Add ==
    fn add(&self, mut item: CacheItem<V>) -> Result<bool> {
        self.prepare(&mut item)?;

        if self.store.contains(item.key(), item.region())? {
            debug!("Add skipped, key '{}' already present", item.key());
            return Ok(false);
        }

        let key = item.key().to_string();
        let added = self.write(item, false)?;
        if added {
            self.stats.record_add();
            debug!("Added key '{}'", key);
        }
        Ok(added)
    }

    // == Get ==
    /// Every get is counted as exactly one hit or one miss; a failed read
    /// is a miss.
    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        self.stats.record_get();

        let result = self.lookup(key, region);
        match &result {
            Ok(Some(_)) => self.stats.record_hit(),
            _ => self.stats.record_miss(),
        }
        result
    }

    // == Put ==
    fn put(&self, mut item: CacheItem<V>) -> Result<()> {
        self.prepare(&mut item)?;
        debug!("Put key '{}'", item.key());
        self.write(item, true)?;
        self.stats.record_put();
        Ok(())
    }

    // == Remove ==
    fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
        let removed = self.store.remove(key, region)?.is_some();
        if removed {
            self.stats.record_remove();
            debug!("Removed key '{}'", key);
        }
        Ok(removed)
    }

    fn exists(&self, key: &str, region: Option<&str>) -> Result<bool> {
        self.store.contains(key, region)
    }

    fn clear(&self) -> Result<()> {
        self.store.flush(None)?;
        self.stats.record_clear();
        debug!("Cleared cache '{}'", self.name());
        Ok(())
    }

    fn clear_region(&self, region: &str) -> Result<()> {
        self.store.flush(Some(region))?;
        self.stats.record_clear_region();
        debug!("Cleared region '{}' of cache '{}'", region, self.name());
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count = self.store.item_count()?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<V> fmt::Debug for FileCacheHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCacheHandle")
            .field("config", &self.config)
            .field("serializer", &self.serializer.is_some())
            .field("listeners", &self.listeners.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
