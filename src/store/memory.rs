//! In-process Store Module
//!
//! A `PersistentStore` binding backed by a map, with the same coarse
//! housekeeping as [`FileStore`](crate::store::FileStore): expired entries
//! are only reclaimed when a write happens at least `housekeeping_interval`
//! after the last sweep. Nothing survives the process.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{now_utc, CachePolicy};
use crate::error::{CacheError, Result};
use crate::store::{PersistentStore, StoreConfig, StoredValue, DEFAULT_MAX_SIZE_BYTES};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    region: Option<String>,
    key: String,
}

impl SlotKey {
    fn new(key: &str, region: Option<&str>) -> Self {
        Self {
            region: region.map(str::to_string),
            key: key.to_string(),
        }
    }
}

#[derive(Debug)]
struct Slot<V> {
    value: StoredValue<V>,
    policy: CachePolicy,
    written_at: DateTime<Utc>,
}

impl<V> Slot<V> {
    fn is_reclaimable(&self, now: DateTime<Utc>) -> bool {
        match self.policy.expires_at(self.written_at) {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}

#[derive(Debug)]
struct State<V> {
    slots: HashMap<SlotKey, Slot<V>>,
    last_sweep: DateTime<Utc>,
    // Tracked only when size calculation is enabled
    size_bytes: Option<u64>,
}

impl<V> State<V> {
    fn insert(&mut self, slot_key: SlotKey, slot: Slot<V>) {
        let added = slot.value.approximate_size() as u64;
        let replaced = self
            .slots
            .insert(slot_key, slot)
            .map_or(0, |old| old.value.approximate_size() as u64);
        if let Some(size) = self.size_bytes.as_mut() {
            *size = (*size + added).saturating_sub(replaced);
        }
    }

    fn take(&mut self, slot_key: &SlotKey) -> Option<Slot<V>> {
        let slot = self.slots.remove(slot_key)?;
        if let Some(size) = self.size_bytes.as_mut() {
            *size = size.saturating_sub(slot.value.approximate_size() as u64);
        }
        Some(slot)
    }

    fn recount(&mut self) {
        if self.size_bytes.is_some() {
            self.size_bytes = Some(
                self.slots
                    .values()
                    .map(|slot| slot.value.approximate_size() as u64)
                    .sum(),
            );
        }
    }
}

// == Memory Store ==
/// Map-backed store binding.
#[derive(Debug)]
pub struct MemoryStore<V> {
    config: StoreConfig,
    max_size_bytes: u64,
    state: RwLock<State<V>>,
}

impl<V> MemoryStore<V> {
    // == Constructor ==
    /// Opens an empty store with the default size limit.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_max_size(config, DEFAULT_MAX_SIZE_BYTES)
    }

    /// Opens an empty store with an explicit size limit.
    ///
    /// With size calculation enabled the store starts counting at zero and
    /// keeps the total current on every write.
    pub fn with_max_size(config: StoreConfig, max_size_bytes: u64) -> Self {
        debug!(
            "Opening store '{}' (housekeeping every {:?})",
            config.instance_name, config.housekeeping_interval
        );
        let size_bytes = config.calculate_size_on_init.then_some(0);
        Self {
            config,
            max_size_bytes,
            state: RwLock::new(State {
                slots: HashMap::new(),
                last_sweep: now_utc(),
                size_bytes,
            }),
        }
    }

    // == Sweep Expired ==
    /// Reclaims every entry whose policy has run out.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> Result<usize> {
        let mut state = self.write()?;
        Ok(sweep(&mut state, now_utc()))
    }

    // == Current Size ==
    /// Approximate bytes held, when size calculation is enabled.
    pub fn current_size_bytes(&self) -> Result<Option<u64>> {
        Ok(self.read()?.size_bytes)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State<V>>> {
        self.state
            .read()
            .map_err(|_| CacheError::StoreUnavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State<V>>> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CacheError::StoreUnavailable("store lock poisoned".to_string()))?;

        let now = now_utc();
        let due = crate::cache::offset(state.last_sweep, self.config.housekeeping_interval)
            .map_or(false, |next| now >= next);
        if due {
            sweep(&mut state, now);
        }
        Ok(state)
    }
}

fn sweep<V>(state: &mut State<V>, now: DateTime<Utc>) -> usize {
    let before = state.slots.len();
    state.slots.retain(|_, slot| !slot.is_reclaimable(now));
    state.last_sweep = now;

    let removed = before - state.slots.len();
    if removed > 0 {
        state.recount();
        debug!("Store housekeeping: removed {} expired entries", removed);
    }
    removed
}

impl<V> PersistentStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn contains(&self, key: &str, region: Option<&str>) -> Result<bool> {
        Ok(self.read()?.slots.contains_key(&SlotKey::new(key, region)))
    }

    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<StoredValue<V>>> {
        Ok(self
            .read()?
            .slots
            .get(&SlotKey::new(key, region))
            .map(|slot| slot.value.clone()))
    }

    fn add(
        &self,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.write()?;
        let slot_key = SlotKey::new(key, region);
        if state.slots.contains_key(&slot_key) {
            return Ok(false);
        }
        state.insert(
            slot_key,
            Slot {
                value,
                policy: *policy,
                written_at: now_utc(),
            },
        );
        Ok(true)
    }

    fn set(
        &self,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<()> {
        self.write()?.insert(
            SlotKey::new(key, region),
            Slot {
                value,
                policy: *policy,
                written_at: now_utc(),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str, region: Option<&str>) -> Result<Option<StoredValue<V>>> {
        Ok(self
            .write()?
            .take(&SlotKey::new(key, region))
            .map(|slot| slot.value))
    }

    fn flush(&self, region: Option<&str>) -> Result<()> {
        let mut state = self.write()?;
        match region {
            Some(region) => state
                .slots
                .retain(|slot_key, _| slot_key.region.as_deref() != Some(region)),
            None => state.slots.clear(),
        }
        state.recount();
        Ok(())
    }

    fn item_count(&self) -> Result<u64> {
        Ok(self.read()?.slots.len() as u64)
    }

    fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}
