//! TTL key-value store backing session persistence and credential bundles.
//!
//! Values are opaque bytes. The directory backend keeps one JSON file per
//! entry so sessions survive process restarts; the memory backend is a locked
//! map. Expired entries are never returned and are evicted on read; the
//! memory backend also drops them on every write.

use crate::error::{FetchError, Result};
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk representation of a cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    expires_at_ms: i64,
    value_hex: String,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    expires_at_ms: i64,
    value: Vec<u8>,
}

#[derive(Debug)]
enum Backend {
    Memory(Mutex<HashMap<String, MemoryEntry>>),
    Directory { root: PathBuf, lock: Mutex<()> },
}

/// TTL cache with whole-second granularity.
#[derive(Debug)]
pub struct CacheStore {
    backend: Backend,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expiry_for(ttl_secs: u64) -> i64 {
    let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    now_ms().saturating_add(ttl_ms)
}

impl CacheStore {
    /// Create a process-local store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
        }
    }

    /// Create a store persisted under `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!("Opened cache directory: {:?}", root);
        Ok(Self {
            backend: Backend::Directory {
                root,
                lock: Mutex::new(()),
            },
        })
    }

    /// Platform cache directory for this crate.
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("com", "chaser", "chaser-sogou")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".cache"))
    }

    /// Store `value` under `key`, replacing any entry and resetting its expiry.
    pub fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        let expires_at_ms = expiry_for(ttl_secs);
        match &self.backend {
            Backend::Memory(map) => {
                let mut map = map
                    .lock()
                    .map_err(|_| FetchError::Cache("memory cache lock poisoned".into()))?;
                let now = now_ms();
                map.retain(|_, entry| entry.expires_at_ms > now);
                map.insert(
                    key.to_string(),
                    MemoryEntry {
                        expires_at_ms,
                        value: value.to_vec(),
                    },
                );
                Ok(())
            }
            Backend::Directory { root, lock } => {
                let _guard = lock
                    .lock()
                    .map_err(|_| FetchError::Cache("cache directory lock poisoned".into()))?;
                let entry = StoredEntry {
                    key: key.to_string(),
                    expires_at_ms,
                    value_hex: hex::encode(value),
                };
                write_entry(&entry_path(root, key), &entry)
            }
        }
    }

    /// Fetch the value for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        match &self.backend {
            Backend::Memory(map) => {
                let mut map = map.lock().ok()?;
                if map.get(key)?.expires_at_ms <= now_ms() {
                    map.remove(key);
                    return None;
                }
                map.get(key).map(|entry| entry.value.clone())
            }
            Backend::Directory { root, lock } => {
                let _guard = lock.lock().ok()?;
                let path = entry_path(root, key);
                read_entry(&path, key)
            }
        }
    }

    /// Remove `key`, returning whether an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        match &self.backend {
            Backend::Memory(map) => map
                .lock()
                .map(|mut map| map.remove(key).is_some())
                .unwrap_or(false),
            Backend::Directory { root, lock } => {
                let Ok(_guard) = lock.lock() else {
                    return false;
                };
                std::fs::remove_file(entry_path(root, key)).is_ok()
            }
        }
    }

    /// Serialize `value` as JSON and store it.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, &bytes, ttl_secs)
    }

    /// Fetch and deserialize a JSON value; undecodable entries count as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Discarding undecodable cache entry {}: {}", key, e);
                self.delete(key);
                None
            }
        }
    }
}

/// Entry file name is the MD5 of the key, so arbitrary keys map to safe paths.
fn entry_path(root: &Path, key: &str) -> PathBuf {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    root.join(format!("{}.json", hex::encode(hasher.finalize())))
}

fn write_entry(path: &Path, entry: &StoredEntry) -> Result<()> {
    let contents = serde_json::to_vec(entry)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .and_then(|_| std::fs::rename(&tmp, path))
        .map_err(|e| FetchError::Cache(format!("Failed to write {:?}: {}", path, e)))
}

fn read_entry(path: &Path, key: &str) -> Option<Vec<u8>> {
    let contents = std::fs::read(path).ok()?;
    let decoded = serde_json::from_slice::<StoredEntry>(&contents)
        .ok()
        .filter(|entry| entry.key == key && entry.expires_at_ms > now_ms())
        .and_then(|entry| hex::decode(entry.value_hex).ok());

    if decoded.is_none() {
        // Expired, corrupt, or a hash collision with another key
        if let Err(e) = std::fs::remove_file(path) {
            tracing::debug!("Failed to evict cache file {:?}: {}", path, e);
        }
    }
    decoded
}
