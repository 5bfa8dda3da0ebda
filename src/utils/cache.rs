//! Advisory caching of search responses.
//!
//! A cache hit returns the stored response verbatim; any failure to read,
//! parse, or write is logged and treated as a miss. The orchestration
//! layer never fails because of the cache.
//!
//! # On-disk layout
//!
//! ```text
//! ~/.cache/scipaper/
//!   searches/
//!     <md5-of-key>.json
//! ```
//!
//! Each file holds the response plus `cached_at` and `expires_at`
//! timestamps.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::SearchResponse;

/// Metadata stored alongside each cached response
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the item was cached (Unix timestamp)
    cached_at: u64,

    /// When the item expires (Unix timestamp)
    expires_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResponse {
    metadata: CacheMetadata,
    response: SearchResponse,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Storage backend for cached search responses.
///
/// Implementations are advisory: `get` answers `None` on any problem and
/// `set` swallows its own failures.
#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    /// Look up a fresh cached response for `key`
    async fn get(&self, key: &str) -> Option<SearchResponse>;

    /// Store a response under `key`, expiring after `ttl`
    async fn set(&self, key: &str, response: &SearchResponse, ttl: Duration);
}

/// File-backed cache under a base directory
#[derive(Debug, Clone)]
pub struct FileCache {
    search_dir: PathBuf,
}

impl FileCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: base_dir.into().join("searches"),
        }
    }

    /// Create the cache directory if it does not exist yet
    pub fn initialize(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.search_dir)?;
        tracing::debug!(dir = %self.search_dir.display(), "Cache initialized");
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Hash the key so arbitrary query text maps to a safe filename
        let digest = md5::compute(key.as_bytes());
        self.search_dir.join(format!("{:x}.json", digest))
    }

    fn read_entry(path: &Path) -> std::io::Result<CachedResponse> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(std::io::Error::other)
    }

    fn write_entry(path: &Path, entry: &CachedResponse) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        fs::write(path, contents)
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> Option<SearchResponse> {
        let path = self.path_for(key);
        match Self::read_entry(&path) {
            Ok(entry) if unix_now() < entry.metadata.expires_at => {
                tracing::debug!(key, "Cache hit");
                Some(entry.response)
            }
            Ok(_) => {
                tracing::debug!(key, "Cache entry expired");
                let _ = fs::remove_file(&path);
                None
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, response: &SearchResponse, ttl: Duration) {
        let now = unix_now();
        let entry = CachedResponse {
            metadata: CacheMetadata {
                cached_at: now,
                expires_at: now + ttl.as_secs(),
            },
            response: response.clone(),
        };

        let path = self.path_for(key);
        if let Err(err) = Self::write_entry(&path, &entry) {
            tracing::warn!(key, error = %err, "Cache write failed");
        }
    }
}

/// In-memory cache, mainly for tests and short-lived embedders
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<SearchResponse> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| unix_now() < entry.metadata.expires_at)
            .map(|entry| entry.response.clone())
    }

    async fn set(&self, key: &str, response: &SearchResponse, ttl: Duration) {
        let now = unix_now();
        let entry = CachedResponse {
            metadata: CacheMetadata {
                cached_at: now,
                expires_at: now + ttl.as_secs(),
            },
            response: response.clone(),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceStatus;

    fn sample_response() -> SearchResponse {
        SearchResponse::new(
            Vec::new(),
            vec![SourceStatus::success("mock", 0, Duration::from_millis(5))],
            Duration::from_millis(12),
        )
    }

    #[tokio::test]
    async fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.initialize().unwrap();

        let response = sample_response();
        cache
            .set("search:q|all|10", &response, Duration::from_secs(60))
            .await;

        let hit = cache.get("search:q|all|10").await.unwrap();
        assert_eq!(hit.statuses.len(), 1);
        assert_eq!(
            serde_json::to_string(&hit).unwrap(),
            serde_json::to_string(&response).unwrap()
        );
    }

    #[tokio::test]
    async fn test_file_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        assert!(cache.get("never-stored").await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_expired_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.initialize().unwrap();

        cache
            .set("short-lived", &sample_response(), Duration::from_secs(0))
            .await;
        assert!(cache.get("short-lived").await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.initialize().unwrap();

        cache
            .set("key", &sample_response(), Duration::from_secs(60))
            .await;
        let path = cache.path_for("key");
        fs::write(&path, "{{not json").unwrap();

        assert!(cache.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_unwritable_dir_does_not_panic() {
        let cache = FileCache::new("/proc/no-such-place");
        // Advisory: the write fails quietly
        cache
            .set("key", &sample_response(), Duration::from_secs(60))
            .await;
        assert!(cache.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache
            .set("key", &sample_response(), Duration::from_secs(60))
            .await;
        assert!(cache.get("key").await.is_some());
        assert!(cache.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("key", &sample_response(), Duration::from_secs(0))
            .await;
        assert!(cache.get("key").await.is_none());
    }
}
