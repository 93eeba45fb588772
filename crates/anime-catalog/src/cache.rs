//! Disk cache for raw upstream payloads.
//!
//! Entries are JSON files wrapped in an envelope recording when they were
//! stored; entries older than the configured expiration count as misses and
//! are removed on read. Only raw payloads go here, never normalized records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct EntryRef<'a, T> {
    stored_at: DateTime<Utc>,
    value: &'a T,
}

#[derive(Deserialize)]
struct Entry<T> {
    stored_at: DateTime<Utc>,
    value: T,
}

/// Expiring cache of upstream responses
pub struct ResponseCache {
    cache_dir: PathBuf,
    enabled: bool,
    /// `None` keeps entries forever
    expiration: Option<Duration>,
}

impl ResponseCache {
    pub fn new(cache_dir: impl AsRef<Path>, enabled: bool, expiration: Option<Duration>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();

        if enabled {
            std::fs::create_dir_all(&cache_dir)
                .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
            info!(
                cache_dir = %cache_dir.display(),
                expiration_secs = expiration.map(|e| e.as_secs()),
                "Response cache initialized"
            );
        }

        Ok(Self {
            cache_dir,
            enabled,
            expiration,
        })
    }

    /// Cache that stores nothing
    pub fn disabled() -> Self {
        Self {
            cache_dir: PathBuf::new(),
            enabled: false,
            expiration: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fresh entry for `key`, if any
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.cache_path(key);
        if !path.exists() {
            debug!(key = key, "Cache miss");
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
        let entry: Entry<T> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        if self.is_expired(entry.stored_at) {
            debug!(key = key, stored_at = %entry.stored_at, "Cache entry expired");
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove expired cache file: {}", path.display()))?;
            return Ok(None);
        }

        debug!(key = key, "Cache hit");
        Ok(Some(entry.value))
    }

    /// Store `value` under `key`, stamped with the current time
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_at(key, value, Utc::now())
    }

    fn set_at<T: Serialize>(&self, key: &str, value: &T, stored_at: DateTime<Utc>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let path = self.cache_path(key);
        let content = serde_json::to_string(&EntryRef { stored_at, value })
            .context("Failed to serialize cache entry")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;

        debug!(key = key, path = %path.display(), "Cache stored");
        Ok(())
    }

    /// [`get`](Self::get) for the fetch path: failures are logged and read as a miss
    pub fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// [`set`](Self::set) for the fetch path: failures are logged only
    pub fn store<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value) {
            warn!(key = key, error = %e, "Failed to cache response");
        }
    }

    /// Whether an entry file exists, fresh or not
    pub fn exists(&self, key: &str) -> bool {
        self.enabled && self.cache_path(key).exists()
    }

    fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
        let Some(expiration) = self.expiration else {
            return false;
        };
        // An entry stamped in the future has a negative age and counts as fresh.
        match (Utc::now() - stored_at).to_std() {
            Ok(age) => age > expiration,
            Err(_) => false,
        }
    }

    /// Percent-encoded, so distinct keys never share a file
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", urlencoding::encode(key)))
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)
                .with_context(|| format!("Failed to remove cache directory: {}", self.cache_dir.display()))?;
            std::fs::create_dir_all(&self.cache_dir)
                .with_context(|| format!("Failed to recreate cache directory: {}", self.cache_dir.display()))?;
            info!("Cache cleared");
        }

        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        if !self.enabled || !self.cache_dir.exists() {
            return Ok(stats);
        }

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                stats.total_files += 1;
                stats.total_size_bytes += entry.metadata()?.len();
            }
        }

        Ok(stats)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FeedQuery, SearchFilters};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn cache(dir: &TempDir, expiration: Option<Duration>) -> Result<ResponseCache> {
        ResponseCache::new(dir.path(), true, expiration)
    }

    #[test]
    fn test_store_and_read() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, Some(Duration::from_secs(600)))?;

        let payload = json!({ "data": [{ "mal_id": 1 }] });
        cache.set("jikan_trending_p1", &payload)?;

        let read: Option<Value> = cache.get("jikan_trending_p1")?;
        assert_eq!(read, Some(payload));
        Ok(())
    }

    #[test]
    fn test_disabled_cache_stores_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = ResponseCache::new(temp_dir.path(), false, None)?;

        cache.set("key", &json!(1))?;
        assert_eq!(cache.get::<Value>("key")?, None);
        assert!(!cache.exists("key"));

        let cache = ResponseCache::disabled();
        assert!(!cache.is_enabled());
        assert_eq!(cache.stats()?.total_files, 0);
        Ok(())
    }

    #[test]
    fn test_miss() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;
        assert_eq!(cache.get::<Value>("nonexistent")?, None);
        Ok(())
    }

    #[test]
    fn test_expired_entry_is_miss_and_removed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, Some(Duration::from_secs(600)))?;

        let stale = Utc::now() - chrono::Duration::seconds(601);
        cache.set_at("old", &json!("payload"), stale)?;
        assert!(cache.exists("old"));

        assert_eq!(cache.get::<Value>("old")?, None);
        assert!(!cache.exists("old"));
        Ok(())
    }

    #[test]
    fn test_entry_within_expiration_is_hit() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, Some(Duration::from_secs(600)))?;

        let recent = Utc::now() - chrono::Duration::seconds(30);
        cache.set_at("recent", &json!("payload"), recent)?;
        assert_eq!(cache.get::<Value>("recent")?, Some(json!("payload")));
        Ok(())
    }

    #[test]
    fn test_no_expiration_keeps_entries() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;

        let ancient = Utc::now() - chrono::Duration::days(365);
        cache.set_at("ancient", &json!(7), ancient)?;
        assert_eq!(cache.get::<Value>("ancient")?, Some(json!(7)));
        Ok(())
    }

    #[test]
    fn test_keys_are_sanitized() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;

        cache.set("anilist_search_q=a/b c_p1", &json!(true))?;
        assert!(temp_dir
            .path()
            .join("anilist_search_q%3Da%2Fb%20c_p1.json")
            .exists());
        assert_eq!(cache.get::<Value>("anilist_search_q=a/b c_p1")?, Some(json!(true)));
        Ok(())
    }

    #[test]
    fn test_distinct_searches_do_not_share_entries() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;
        let key = |text: &str| {
            let query = FeedQuery::search(SearchFilters {
                query: Some(text.to_string()),
                ..Default::default()
            });
            format!("jikan_{}_p1", query.cache_key())
        };

        cache.set(&key("re:zero"), &json!("results for re:zero"))?;
        assert_eq!(cache.get::<Value>(&key("re zero"))?, None);
        assert_eq!(cache.get::<Value>(&key("re_zero"))?, None);
        assert_eq!(
            cache.get::<Value>(&key("re:zero"))?,
            Some(json!("results for re:zero"))
        );

        cache.set("a b", &json!(1))?;
        cache.set("a_b", &json!(2))?;
        cache.set("a%20b", &json!(3))?;
        assert_eq!(cache.get::<Value>("a b")?, Some(json!(1)));
        assert_eq!(cache.get::<Value>("a_b")?, Some(json!(2)));
        assert_eq!(cache.get::<Value>("a%20b")?, Some(json!(3)));
        Ok(())
    }

    #[test]
    fn test_corrupt_entry_is_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;

        std::fs::write(temp_dir.path().join("broken.json"), "{not json")?;
        assert!(cache.get::<Value>("broken").is_err());
        Ok(())
    }

    #[test]
    fn test_lookup_treats_corrupt_entry_as_miss() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;

        std::fs::write(temp_dir.path().join("broken.json"), "{not json")?;
        assert_eq!(cache.lookup::<Value>("broken"), None);

        cache.store("fine", &json!([1, 2]));
        assert_eq!(cache.lookup::<Value>("fine"), Some(json!([1, 2])));
        Ok(())
    }

    #[test]
    fn test_clear_and_stats() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = cache(&temp_dir, None)?;

        assert_eq!(cache.stats()?.total_files, 0);
        cache.set("a", &json!(1))?;
        cache.set("b", &json!(2))?;

        let stats = cache.stats()?;
        assert_eq!(stats.total_files, 2);
        assert!(stats.total_size_bytes > 0);

        cache.clear()?;
        assert_eq!(cache.stats()?.total_files, 0);
        Ok(())
    }
}
