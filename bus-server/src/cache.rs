//! Keyed TTL cache for provider responses.
//!
//! Static provider data (routes, stop sequences, station lists) changes
//! rarely and the provider is slow and rate limited, so responses are kept
//! for a week. Entries live in memory and, when a directory is configured,
//! in one JSON file per key so they survive restarts.
//!
//! Two rules protect a good entry from a bad response:
//! - an empty result is returned to the caller but never stored;
//! - a failed fetch falls back to whatever is stored, even if expired.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use moka::future::Cache as MokaCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default TTL: 7 days.
const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served without refetching.
    pub ttl: Duration,

    /// Maximum number of in-memory entries.
    pub max_capacity: u64,

    /// Directory for the on-disk copy. `None` keeps entries in memory only.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_capacity: 10_000,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_capacity(mut self, n: u64) -> Self {
        self.max_capacity = n;
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

/// A stored response with the time it was written.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// Unix timestamp when the entry was written.
    cached_at_secs: u64,
    payload: serde_json::Value,
}

impl StoredEntry {
    fn is_fresh(&self, ttl: Duration, now_secs: u64) -> bool {
        now_secs.saturating_sub(self.cached_at_secs) < ttl.as_secs()
    }
}

/// TTL cache with stale-on-failure fallback.
pub struct TtlCache {
    entries: MokaCache<String, Arc<StoredEntry>>,
    ttl: Duration,
    dir: Option<PathBuf>,
}

impl TtlCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();

        Self {
            entries,
            ttl: config.ttl,
            dir: config.dir.clone(),
        }
    }

    /// Return the cached list for `key`, or fetch it.
    ///
    /// A fresh entry is returned without calling `fetcher` unless
    /// `force_refresh` is set. Otherwise the fetcher runs once:
    /// - a non-empty result is stored and returned;
    /// - an empty result is returned and the stored entry left alone;
    /// - an error returns the stored entry if there is one, else the error.
    pub async fn get<T, E, F, Fut>(
        &self,
        key: &str,
        force_refresh: bool,
        fetcher: F,
    ) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let stored = self.lookup(key).await;

        if !force_refresh
            && let Some(entry) = &stored
            && entry.is_fresh(self.ttl, now_secs())
            && let Some(values) = decode::<T>(key, entry)
        {
            debug!(key, "cache hit");
            return Ok(values);
        }

        match fetcher().await {
            Ok(values) => {
                if values.is_empty() {
                    debug!(key, "fetched empty result, keeping stored entry");
                } else {
                    self.store(key, &values).await;
                }
                Ok(values)
            }
            Err(e) => match stored.as_ref().and_then(|entry| decode::<T>(key, entry)) {
                Some(values) => {
                    warn!(key, error = %e, "fetch failed, serving stale entry");
                    Ok(values)
                }
                None => Err(e),
            },
        }
    }

    /// Drop one entry from memory and disk.
    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
        if let Some(path) = self.file_path(key)
            && let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(key, error = %e, "failed to remove cache file");
        }
    }

    /// Drop every in-memory entry. Files on disk are kept.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate number of in-memory entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn lookup(&self, key: &str) -> Option<Arc<StoredEntry>> {
        if let Some(entry) = self.entries.get(key).await {
            return Some(entry);
        }

        let path = self.file_path(key)?;
        let contents = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str::<StoredEntry>(&contents) {
            Ok(entry) => {
                let entry = Arc::new(entry);
                self.entries.insert(key.to_string(), entry.clone()).await;
                Some(entry)
            }
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "ignoring corrupt cache file");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, values: &[T]) {
        let payload = match serde_json::to_value(values) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize cache entry");
                return;
            }
        };
        let entry = Arc::new(StoredEntry {
            cached_at_secs: now_secs(),
            payload,
        });

        if let Some(path) = self.file_path(key)
            && let Err(e) = write_entry(&path, &entry).await
        {
            warn!(key, path = %path.display(), error = %e, "failed to write cache file");
        }

        self.entries.insert(key.to_string(), entry).await;
        debug!(key, "stored cache entry");
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", escape_key(key))))
    }
}

fn decode<T: DeserializeOwned>(key: &str, entry: &StoredEntry) -> Option<Vec<T>> {
    match serde_json::from_value(entry.payload.clone()) {
        Ok(values) => Some(values),
        Err(e) => {
            warn!(key, error = %e, "stored entry has unexpected shape");
            None
        }
    }
}

async fn write_entry(path: &Path, entry: &StoredEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec(entry)?;
    tokio::fs::write(path, json).await
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Map a key to a file stem. Percent-encoding keeps distinct keys distinct.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
