use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreResult;
use crate::map::UrlMap;
use crate::traits::Store;

/// Read-caching proxy in front of a remote primary.
///
/// Every `put` is forwarded, so keys are only ever minted by the primary.
/// `get` answers from the local cache when it can and otherwise asks the
/// primary once, caching what comes back. The cache is never invalidated;
/// since primary bindings never change, a cached value can only be missing,
/// not wrong. Failed remote calls leave the cache untouched.
pub struct ReplicaStore {
    cache: UrlMap,
    remote: Arc<dyn Store>,
}

impl ReplicaStore {
    /// Create a replica delegating to `remote`, with an empty cache.
    pub fn new(remote: Arc<dyn Store>) -> Self {
        Self {
            cache: UrlMap::new(),
            remote,
        }
    }

    /// Number of entries currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Cached URL for `key`, without consulting the primary.
    pub fn cached(&self, key: &str) -> Option<String> {
        self.cache.get(key)
    }

    fn remember(&self, key: &str, url: &str) {
        // Losing this race to a concurrent fill is harmless.
        if let Err(e) = self.cache.insert(key, url) {
            debug!(%key, error = %e, "cache fill skipped");
        }
    }
}

#[async_trait]
impl Store for ReplicaStore {
    async fn put(&self, url: String) -> StoreResult<String> {
        let key = self.remote.put(url.clone()).await?;
        self.remember(&key, &url);
        debug!(%key, "put forwarded to primary");
        Ok(key)
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        if let Some(url) = self.cache.get(key) {
            debug!(%key, "cache hit");
            return Ok(url);
        }

        let url = self.remote.get(key).await?;
        self.remember(key, &url);
        debug!(%key, "cache miss filled from primary");
        Ok(url)
    }
}

impl std::fmt::Debug for ReplicaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaStore")
            .field("cached", &self.cached_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::primary::PrimaryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegate that counts calls before passing them to a primary.
    struct CountingStore {
        inner: PrimaryStore,
        gets: AtomicUsize,
        puts: AtomicUsize,
    }

    impl CountingStore {
        fn new(inner: PrimaryStore) -> Arc<Self> {
            Arc::new(Self {
                inner,
                gets: AtomicUsize::new(0),
                puts: AtomicUsize::new(0),
            })
        }

        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        fn puts(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn put(&self, url: String) -> StoreResult<String> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(url).await
        }

        async fn get(&self, key: &str) -> StoreResult<String> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
    }

    /// Delegate whose every call fails.
    struct DownStore;

    #[async_trait]
    impl Store for DownStore {
        async fn put(&self, _url: String) -> StoreResult<String> {
            Err(StoreError::Remote("connection refused".into()))
        }

        async fn get(&self, _key: &str) -> StoreResult<String> {
            Err(StoreError::Remote("connection refused".into()))
        }
    }

    fn seeded_primary() -> PrimaryStore {
        let primary = PrimaryStore::in_memory();
        primary.set("0", "a.com").unwrap();
        primary.set("1", "b.com").unwrap();
        primary
    }

    #[tokio::test]
    async fn miss_then_hit_calls_remote_once() {
        let remote = CountingStore::new(seeded_primary());
        let replica = ReplicaStore::new(remote.clone());

        assert_eq!(replica.get("1").await.unwrap(), "b.com");
        assert_eq!(remote.gets(), 1);

        assert_eq!(replica.get("1").await.unwrap(), "b.com");
        assert_eq!(remote.gets(), 1);
        assert_eq!(replica.cached_len(), 1);
    }

    #[tokio::test]
    async fn put_forwards_and_caches() {
        let remote = CountingStore::new(seeded_primary());
        let replica = ReplicaStore::new(remote.clone());

        let key = replica.put("c.com".into()).await.unwrap();
        assert_eq!(key, "2");
        assert_eq!(remote.puts(), 1);
        assert_eq!(remote.inner.get("2").unwrap(), "c.com");

        assert_eq!(replica.get("2").await.unwrap(), "c.com");
        assert_eq!(remote.gets(), 0);
    }

    #[tokio::test]
    async fn every_put_is_forwarded() {
        let remote = CountingStore::new(PrimaryStore::in_memory());
        let replica = ReplicaStore::new(remote.clone());

        for _ in 0..3 {
            replica.put("same.com".into()).await.unwrap();
        }
        assert_eq!(remote.puts(), 3);
        assert_eq!(remote.inner.count(), 3);
    }

    #[tokio::test]
    async fn remote_not_found_is_propagated_and_not_cached() {
        let remote = CountingStore::new(seeded_primary());
        let replica = ReplicaStore::new(remote.clone());

        let err = replica.get("9").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref k) if k == "9"));
        assert_eq!(replica.cached_len(), 0);

        // Misses are not cached, so the primary is asked again.
        replica.get("9").await.unwrap_err();
        assert_eq!(remote.gets(), 2);
    }

    #[tokio::test]
    async fn remote_failure_leaves_cache_untouched() {
        let replica = ReplicaStore::new(Arc::new(DownStore));

        let err = replica.put("x.com".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
        let err = replica.get("0").await.unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
        assert_eq!(replica.cached_len(), 0);
    }

    #[tokio::test]
    async fn cache_serves_entries_deleted_upstream() {
        let primary = Arc::new(seeded_primary());
        let replica = ReplicaStore::new(primary.clone());
        replica.get("0").await.unwrap();

        primary.delete("0");
        assert_eq!(replica.get("0").await.unwrap(), "a.com");
        assert_eq!(replica.cached("0").as_deref(), Some("a.com"));
    }

    #[test]
    fn debug_format() {
        let replica = ReplicaStore::new(Arc::new(DownStore));
        assert!(format!("{replica:?}").contains("ReplicaStore"));
    }
}
