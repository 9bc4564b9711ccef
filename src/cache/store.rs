//! Namespaced key-value store for cached API responses
//!
//! Provides a `CacheStore` that keeps one JSON state file per namespace,
//! holding every cached entry along with cumulative hit/miss counters.
//! Keys are kept verbatim inside the state file, so keys containing
//! separator characters survive round-trips and prefix invalidation works
//! on the original key text.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single cached response with its expiry metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreEntry {
    /// The cached response body
    value: Value,
    /// When the value was cached
    cached_at: DateTime<Utc>,
    /// When the entry stops being served
    expires_at: DateTime<Utc>,
}

/// On-disk state for one namespace: entries plus cumulative counters
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    entries: BTreeMap<String, StoreEntry>,
    hits: u64,
    misses: u64,
}

/// Statistics snapshot reported by `cache-stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently in the store, fresh or expired
    pub entries: usize,
    /// Entries past their TTL that have not yet been swept
    pub expired: usize,
    /// Cumulative lookup hits
    pub hits: u64,
    /// Cumulative lookup misses
    pub misses: u64,
    /// Whether lookups are currently being served
    pub enabled: bool,
}

/// Manages cached API responses for one namespace
///
/// State lives in a single JSON file (`<dir>/<namespace>.json`) under an
/// XDG-compliant cache directory, so consecutive CLI invocations share the
/// cache. Every mutation is written back immediately.
#[derive(Debug)]
pub struct CacheStore {
    /// Path of the namespace state file
    path: PathBuf,
    /// When false, lookups miss silently and writes are dropped
    enabled: bool,
    state: StoreState,
}

impl CacheStore {
    /// Opens the store for a namespace in the platform cache directory
    ///
    /// Uses `~/.cache/shiptrack/<namespace>.json` on Linux, or the
    /// equivalent XDG path elsewhere. Returns `None` if no cache directory
    /// can be determined (e.g., no home directory).
    pub fn open(namespace: &str) -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "shiptrack")?;
        Some(Self::with_dir(
            project_dirs.cache_dir().to_path_buf(),
            namespace,
        ))
    }

    /// Opens the store for a namespace in a custom directory
    ///
    /// Used by tests and the `--cache-dir` flag.
    pub fn with_dir(dir: PathBuf, namespace: &str) -> Self {
        let path = dir.join(format!("{}.json", namespace));
        let state = Self::load_state(&path);
        Self {
            path,
            enabled: true,
            state,
        }
    }

    /// Toggles whether lookups are served and writes recorded
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns whether the store is currently serving lookups
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Looks up a key, counting the access as a hit or miss
    ///
    /// An entry past its TTL is removed and counted as a miss. A disabled
    /// store always returns `None` without touching the counters.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }

        let now = Utc::now();
        match self.state.entries.get(key) {
            Some(entry) if now <= entry.expires_at => {
                let value = entry.value.clone();
                self.state.hits += 1;
                let _ = self.save();
                Some(value)
            }
            Some(_) => {
                self.state.entries.remove(key);
                self.state.misses += 1;
                let _ = self.save();
                None
            }
            None => {
                self.state.misses += 1;
                let _ = self.save();
                None
            }
        }
    }

    /// Stores a value under a key with the given TTL
    ///
    /// Overwrites any existing entry for the key. A disabled store drops
    /// the write.
    pub fn put(&mut self, key: &str, value: Value, ttl: Duration) -> std::io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let now = Utc::now();
        self.state.entries.insert(
            key.to_string(),
            StoreEntry {
                value,
                cached_at: now,
                expires_at: now + ttl,
            },
        );
        self.save()
    }

    /// Removes every entry whose key starts with the given pattern
    ///
    /// Returns the number of entries removed. Invalidation applies even
    /// when the store is disabled, so administrative commands always work.
    pub fn invalidate(&mut self, pattern: &str) -> usize {
        let before = self.state.entries.len();
        self.state.entries.retain(|key, _| !key.starts_with(pattern));
        let removed = before - self.state.entries.len();
        if removed > 0 {
            let _ = self.save();
        }
        removed
    }

    /// Drops every entry and resets the hit/miss counters
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.state.entries.len();
        self.state = StoreState::default();
        let _ = self.save();
        removed
    }

    /// Reports a statistics snapshot for the namespace
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let expired = self
            .state
            .entries
            .values()
            .filter(|entry| now > entry.expires_at)
            .count();
        CacheStats {
            entries: self.state.entries.len(),
            expired,
            hits: self.state.hits,
            misses: self.state.misses,
            enabled: self.enabled,
        }
    }

    /// Loads namespace state, starting fresh if the file is absent or unreadable
    fn load_state(path: &PathBuf) -> StoreState {
        let Ok(content) = fs::read_to_string(path) else {
            return StoreState::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Writes the namespace state back to disk
    fn save(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)
    }
}
