//! File Store Module
//!
//! A `PersistentStore` binding that keeps every entry on disk, so a handle
//! reopened over the same directory sees what an earlier process wrote.
//!
//! Layout under the instance directory:
//!
//! ```text
//! <base_dir>/<instance_name>/
//!     _default/<sha256(key)>.bin
//!     _default/<sha256(key)>.meta.json
//!     region-<sha256(region)>/<sha256(key)>.bin
//!     region-<sha256(region)>/<sha256(key)>.meta.json
//! ```
//!
//! The `.bin` file holds the raw value and the JSON sidecar holds the key,
//! region, value kind, policy and write time. Both are written under a
//! temporary name and renamed into place, data first, so a sidecar never
//! points at a half-written value.

use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cache::{now_utc, offset, CacheItem, CachePolicy};
use crate::error::{CacheError, Result};
use crate::store::{PersistentStore, StoreConfig, StoredValue, DEFAULT_MAX_SIZE_BYTES};

// == Layout Constants ==
const DEFAULT_REGION_DIR: &str = "_default";
const DATA_SUFFIX: &str = ".bin";
const META_SUFFIX: &str = ".meta.json";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ValueKind {
    Serialized,
    Item,
}

/// Sidecar written next to every data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    region: Option<String>,
    kind: ValueKind,
    policy: CachePolicy,
    written_at: DateTime<Utc>,
}

impl EntryMeta {
    fn is_reclaimable(&self, now: DateTime<Utc>) -> bool {
        self.policy
            .expires_at(self.written_at)
            .map_or(false, |expires| now >= expires)
    }
}

struct EntryPaths {
    data: PathBuf,
    meta: PathBuf,
}

#[derive(Debug)]
struct State {
    last_sweep: DateTime<Utc>,
    // Bytes of data files, tracked only when size calculation is enabled
    size_bytes: Option<u64>,
}

impl State {
    fn resize(&mut self, removed: u64, added: u64) {
        if let Some(size) = self.size_bytes.as_mut() {
            *size = (*size + added).saturating_sub(removed);
        }
    }
}

// == File Store ==
/// Directory-backed store binding.
///
/// One process-wide lock serializes calls on the same store value, which
/// makes `add` atomic within the process. Two processes sharing a directory
/// only get per-file rename atomicity.
pub struct FileStore<V> {
    config: StoreConfig,
    root: PathBuf,
    max_size_bytes: u64,
    state: Mutex<State>,
    _value: PhantomData<fn() -> V>,
}

impl<V> FileStore<V> {
    // == Constructor ==
    /// Opens (creating if needed) the instance directory with the default size limit.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::with_max_size(config, DEFAULT_MAX_SIZE_BYTES)
    }

    /// Opens the instance directory with an explicit size limit.
    ///
    /// With size calculation enabled the existing tree is walked once here
    /// and the total is kept current on every write afterwards.
    pub fn with_max_size(config: StoreConfig, max_size_bytes: u64) -> Result<Self> {
        let root = config.root_dir()?;
        fs::create_dir_all(&root)?;

        let size_bytes = if config.calculate_size_on_init {
            let size = tree_size(&root)?;
            debug!("File store '{}' holds {} bytes on open", config.instance_name, size);
            Some(size)
        } else {
            None
        };

        info!(
            "Opened file store '{}' at {} (housekeeping every {:?})",
            config.instance_name,
            root.display(),
            config.housekeeping_interval
        );

        Ok(Self {
            config,
            root,
            max_size_bytes,
            state: Mutex::new(State {
                last_sweep: now_utc(),
                size_bytes,
            }),
            _value: PhantomData,
        })
    }

    /// Absolute path of the instance directory.
    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    /// Bytes of stored values on disk, when size calculation is enabled.
    pub fn current_size_bytes(&self) -> Result<Option<u64>> {
        Ok(self.lock()?.size_bytes)
    }

    // == Sweep Expired ==
    /// Deletes every entry whose policy has run out.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> Result<usize> {
        let mut state = self.lock()?;
        self.sweep(&mut state, now_utc())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CacheError::StoreUnavailable("store lock poisoned".to_string()))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock()?;

        let now = now_utc();
        let due = offset(state.last_sweep, self.config.housekeeping_interval)
            .map_or(false, |next| now >= next);
        if due {
            self.sweep(&mut state, now)?;
        }
        Ok(state)
    }

    fn sweep(&self, state: &mut State, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for entry in files_ending_with(&self.root, META_SUFFIX)? {
            let meta = match read_meta(entry.path()) {
                Ok(Some(meta)) => meta,
                Ok(None) => continue,
                Err(err) => {
                    warn!("Skipping unreadable sidecar {}: {}", entry.path().display(), err);
                    continue;
                }
            };
            if meta.is_reclaimable(now) {
                let paths = self.entry_paths(&meta.key, meta.region.as_deref());
                let freed = delete_entry(&paths)?;
                state.resize(freed, 0);
                removed += 1;
            }
        }
        state.last_sweep = now;

        if removed > 0 {
            debug!("Store housekeeping: removed {} expired entries", removed);
        }
        Ok(removed)
    }

    // == Layout ==
    fn region_dir(&self, region: Option<&str>) -> PathBuf {
        match region {
            Some(region) => self.root.join(format!("region-{}", digest(region))),
            None => self.root.join(DEFAULT_REGION_DIR),
        }
    }

    fn entry_paths(&self, key: &str, region: Option<&str>) -> EntryPaths {
        let dir = self.region_dir(region);
        let name = digest(key);
        EntryPaths {
            data: dir.join(format!("{}{}", name, DATA_SUFFIX)),
            meta: dir.join(format!("{}{}", name, META_SUFFIX)),
        }
    }
}

impl<V> FileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn store_entry(
        &self,
        state: &mut State,
        paths: &EntryPaths,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<()> {
        let (kind, bytes) = match value {
            StoredValue::Serialized(bytes) => (ValueKind::Serialized, bytes),
            StoredValue::Item(item) => (ValueKind::Item, serde_json::to_vec(&item)?),
        };
        let meta = EntryMeta {
            key: key.to_string(),
            region: region.map(str::to_string),
            kind,
            policy: *policy,
            written_at: now_utc(),
        };

        if let Some(dir) = paths.data.parent() {
            fs::create_dir_all(dir)?;
        }
        let replaced = file_len(&paths.data)?;
        write_atomic(&paths.data, &bytes)?;
        write_atomic(&paths.meta, &serde_json::to_vec_pretty(&meta)?)?;
        state.resize(replaced, bytes.len() as u64);
        Ok(())
    }

    fn load(&self, paths: &EntryPaths) -> Result<Option<(ValueKind, Vec<u8>)>> {
        let meta = match read_meta(&paths.meta)? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        match read_if_present(&paths.data)? {
            Some(bytes) => Ok(Some((meta.kind, bytes))),
            None => {
                warn!("Value file of key '{}' is missing, dropping its sidecar", meta.key);
                remove_if_present(&paths.meta)?;
                Ok(None)
            }
        }
    }
}

fn decode<V: DeserializeOwned>(kind: ValueKind, bytes: Vec<u8>) -> Result<StoredValue<V>> {
    match kind {
        ValueKind::Serialized => Ok(StoredValue::Serialized(bytes)),
        ValueKind::Item => Ok(StoredValue::Item(serde_json::from_slice::<CacheItem<V>>(&bytes)?)),
    }
}

impl<V> PersistentStore<V> for FileStore<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned,
{
    fn contains(&self, key: &str, region: Option<&str>) -> Result<bool> {
        let _state = self.lock()?;
        Ok(self.entry_paths(key, region).meta.try_exists()?)
    }

    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<StoredValue<V>>> {
        let _state = self.lock()?;
        match self.load(&self.entry_paths(key, region))? {
            Some((kind, bytes)) => Ok(Some(decode(kind, bytes)?)),
            None => Ok(None),
        }
    }

    fn add(
        &self,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.lock_for_write()?;
        let paths = self.entry_paths(key, region);
        if paths.meta.try_exists()? {
            return Ok(false);
        }
        self.store_entry(&mut state, &paths, key, value, policy, region)?;
        Ok(true)
    }

    fn set(
        &self,
        key: &str,
        value: StoredValue<V>,
        policy: &CachePolicy,
        region: Option<&str>,
    ) -> Result<()> {
        let mut state = self.lock_for_write()?;
        let paths = self.entry_paths(key, region);
        self.store_entry(&mut state, &paths, key, value, policy, region)
    }

    /// An entry whose live item no longer decodes is still deleted and comes
    /// back as its raw bytes.
    fn remove(&self, key: &str, region: Option<&str>) -> Result<Option<StoredValue<V>>> {
        let mut state = self.lock_for_write()?;
        let paths = self.entry_paths(key, region);
        let previous = match self.load(&paths)? {
            Some(previous) => previous,
            None => return Ok(None),
        };
        let freed = delete_entry(&paths)?;
        state.resize(freed, 0);

        let (kind, bytes) = previous;
        match decode(kind, bytes.clone()) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!("Removed key '{}' whose value no longer decodes: {}", key, err);
                Ok(Some(StoredValue::Serialized(bytes)))
            }
        }
    }

    fn flush(&self, region: Option<&str>) -> Result<()> {
        let mut state = self.lock_for_write()?;
        match region {
            Some(region) => {
                let dir = self.region_dir(Some(region));
                let freed = tree_size(&dir)?;
                remove_dir_if_present(&dir)?;
                state.resize(freed, 0);
                debug!("Flushed region '{}' at {}", region, dir.display());
            }
            None => {
                remove_dir_if_present(&self.root)?;
                fs::create_dir_all(&self.root)?;
                if state.size_bytes.is_some() {
                    state.size_bytes = Some(0);
                }
                info!("Flushed file store at {}", self.root.display());
            }
        }
        Ok(())
    }

    fn item_count(&self) -> Result<u64> {
        let _state = self.lock()?;
        Ok(files_ending_with(&self.root, META_SUFFIX)?.len() as u64)
    }

    fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}

impl<V> fmt::Debug for FileStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("max_size_bytes", &self.max_size_bytes)
            .finish()
    }
}

// == File Helpers ==
fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn read_meta(path: &Path) -> Result<Option<EntryMeta>> {
    match read_if_present(path)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, path)?;
    Ok(())
}

fn file_len(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.len()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
        Err(err) => Err(err.into()),
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

fn remove_dir_if_present(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

/// Deletes both files of an entry, sidecar first. Returns the bytes freed.
fn delete_entry(paths: &EntryPaths) -> Result<u64> {
    let freed = file_len(&paths.data)?;
    remove_if_present(&paths.meta)?;
    remove_if_present(&paths.data)?;
    Ok(freed)
}

fn files_ending_with(dir: &Path, suffix: &str) -> Result<Vec<DirEntry>> {
    if !dir.try_exists()? {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry);
        }
    }
    Ok(files)
}

fn tree_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in files_ending_with(dir, DATA_SUFFIX)? {
        total += entry.metadata()?.len();
    }
    Ok(total)
}
