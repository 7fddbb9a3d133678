//! # Memory Cache Store
//!
//! An in-process [`CacheStore`] that indexes cached copies with Moka. Fetching
//! the bytes is delegated to a [`Populator`]; this store only remembers where
//! each key landed and coalesces concurrent populates of the same key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::key::CacheKey;
use crate::cache::store::{CacheStore, HeaderResolver, LocalPath, is_remote_url};
use crate::error::{CacheError, CacheResult};

/// Fetches a resource into local storage
#[async_trait]
pub trait Populator: Send + Sync {
    async fn populate(&self, key: &CacheKey, headers: HeaderMap) -> CacheResult<LocalPath>;
}

/// Configuration for [`MemoryCacheStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Maximum number of indexed entries
    pub max_entries: u64,
    /// Drop entries not looked up for this long
    pub time_to_idle: Option<Duration>,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            time_to_idle: None,
        }
    }
}

/// Memory-indexed cache store
#[derive(Clone)]
pub struct MemoryCacheStore {
    index: MokaCache<CacheKey, LocalPath>,
    populator: Arc<dyn Populator>,
}

impl MemoryCacheStore {
    /// Create a store. Fails when `max_entries` is zero.
    pub fn new(config: MemoryStoreConfig, populator: Arc<dyn Populator>) -> CacheResult<Self> {
        if config.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than zero".to_string(),
            ));
        }

        let mut builder = MokaCache::builder().max_capacity(config.max_entries);
        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        debug!(
            max_entries = config.max_entries,
            time_to_idle = ?config.time_to_idle,
            "Memory cache store created"
        );

        Ok(Self {
            index: builder.build(),
            populator,
        })
    }

    /// Record an existing local copy for a key
    pub async fn insert(&self, key: CacheKey, path: LocalPath) {
        self.index.insert(key, path).await;
    }

    /// Forget a key
    pub async fn remove(&self, key: &CacheKey) {
        self.index.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.index.entry_count()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn is_cacheable(&self, url: Option<&str>) -> bool {
        is_remote_url(url)
    }

    async fn lookup(&self, key: &CacheKey) -> CacheResult<LocalPath> {
        match self.index.get(key).await {
            Some(path) => {
                debug!(key = %key, path = %path, "Cache hit");
                Ok(path)
            }
            None => Err(CacheError::miss(key)),
        }
    }

    async fn populate(&self, key: &CacheKey, headers: HeaderResolver) -> CacheResult<LocalPath> {
        let populator = Arc::clone(&self.populator);
        // Concurrent callers for the same key share one populator run
        let init = async move {
            let headers = headers
                .resolve()
                .await
                .map_err(|e| CacheError::HeaderResolution(e.to_string()))?;
            populator.populate(key, headers).await
        };

        let path = self
            .index
            .try_get_with_by_ref(key, init)
            .await
            .map_err(CacheError::from)?;
        debug!(key = %key, path = %path, "Cache populated");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{CacheOptions, ResourceIdentity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingPopulator {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl CountingPopulator {
        fn new(fail: bool, gate: Option<Arc<Notify>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate,
                fail,
            })
        }
    }

    #[async_trait]
    impl Populator for CountingPopulator {
        async fn populate(&self, key: &CacheKey, headers: HeaderMap) -> CacheResult<LocalPath> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(CacheError::Populate(format!(
                    "download of {} failed",
                    key.source_url
                )));
            }
            assert!(headers.contains_key("x-auth"));
            Ok(LocalPath::new(format!("/cache/{}", key.to_filename())))
        }
    }

    fn key(url: &str) -> CacheKey {
        CacheKey::derive(&ResourceIdentity::new(url, CacheOptions::default())).unwrap()
    }

    fn auth_headers() -> HeaderResolver {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth", "secret".parse().unwrap());
        HeaderResolver::fixed(headers)
    }

    fn store(populator: Arc<CountingPopulator>) -> MemoryCacheStore {
        MemoryCacheStore::new(MemoryStoreConfig::default(), populator).unwrap()
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = MemoryStoreConfig {
            max_entries: 0,
            time_to_idle: None,
        };
        let err = MemoryCacheStore::new(config, CountingPopulator::new(false, None))
            .err()
            .unwrap();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_ignored_query_params_share_entry() {
        let populator = CountingPopulator::new(false, None);
        let store = store(populator.clone());
        let populated = key("https://cdn.example.com/a.mp4?token=abc");
        let looked_up = key("https://cdn.example.com/a.mp4?token=xyz");

        let path = store.populate(&populated, auth_headers()).await.unwrap();
        assert_eq!(store.lookup(&looked_up).await.unwrap(), path);

        // Coalesced with the existing entry, the populator is not run again
        let again = store.populate(&looked_up, auth_headers()).await.unwrap();
        assert_eq!(again, path);
        assert_eq!(populator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_miss_then_populate_then_hit() {
        let populator = CountingPopulator::new(false, None);
        let store = store(populator.clone());
        let k = key("https://cdn.example.com/a.mp4");

        let err = store.lookup(&k).await.unwrap_err();
        assert!(err.is_miss());

        let path = store.populate(&k, auth_headers()).await.unwrap();
        assert_eq!(path, LocalPath::new(format!("/cache/{}", k.to_filename())));

        assert_eq!(store.lookup(&k).await.unwrap(), path);
        assert_eq!(populator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_populate_failure_is_not_indexed() {
        let populator = CountingPopulator::new(true, None);
        let store = store(populator.clone());
        let k = key("https://cdn.example.com/a.mp4");

        let err = store.populate(&k, auth_headers()).await.unwrap_err();
        assert!(matches!(err.root(), CacheError::Populate(_)));
        assert!(store.lookup(&k).await.unwrap_err().is_miss());

        // A later attempt runs the populator again
        let _ = store.populate(&k, auth_headers()).await;
        assert_eq!(populator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_header_failure_skips_populator() {
        let populator = CountingPopulator::new(false, None);
        let store = store(populator.clone());
        let k = key("https://cdn.example.com/a.mp4");
        let headers =
            HeaderResolver::new(|| async { Err(CacheError::Populate("no token".to_string())) });

        let err = store.populate(&k, headers).await.unwrap_err();
        assert!(matches!(err.root(), CacheError::HeaderResolution(_)));
        assert_eq!(populator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_populates_coalesce() {
        let gate = Arc::new(Notify::new());
        let populator = CountingPopulator::new(false, Some(gate.clone()));
        let store = store(populator.clone());
        let k = key("https://cdn.example.com/a.mp4");

        let first = tokio::spawn({
            let store = store.clone();
            let k = k.clone();
            async move { store.populate(&k, auth_headers()).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            let k = k.clone();
            async move { store.populate(&k, auth_headers()).await }
        });

        while populator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        // Let the second caller reach the coalescing point
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(populator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let store = store(CountingPopulator::new(false, None));
        let k = key("https://cdn.example.com/b.mp4");

        store.insert(k.clone(), LocalPath::from("/cache/b.mp4")).await;
        assert_eq!(store.lookup(&k).await.unwrap(), LocalPath::from("/cache/b.mp4"));

        store.remove(&k).await;
        assert!(store.lookup(&k).await.is_err());
        assert!(store.is_cacheable(Some("https://cdn.example.com/b.mp4")));
        assert!(!store.is_cacheable(Some("file:///cache/b.mp4")));
    }
}
