use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::services::cache::{CacheClient, CacheError};
use crate::services::tenant::dispatcher::{DispatchError, Dispatcher};

/// Positive lookup cache in front of another dispatcher.
///
/// Only hits are cached, so a tenant created after a miss is visible immediately.
/// Cache failures fall through to the inner dispatcher.
pub struct CachedDispatcher<D, C> {
    inner: D,
    cache: C,
    ttl: Duration,
    prefix: String,
}

impl<D: Dispatcher, C: CacheClient> CachedDispatcher<D, C> {
    pub fn new(inner: D, cache: C, ttl: Duration) -> Self {
        Self::new_with_prefix(inner, cache, ttl, "tenant:domain")
    }

    pub fn new_with_prefix(inner: D, cache: C, ttl: Duration, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            cache,
            ttl,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, domain_name: &str) -> String {
        format!("{}:{}", self.prefix, domain_name)
    }

    /// Drop the cached mapping for a domain (ex: after a tenant is renamed).
    pub async fn invalidate(&self, domain_name: &str) -> Result<bool, CacheError> {
        Ok(self.cache.del(&self.key(domain_name)).await? > 0)
    }
}

#[async_trait]
impl<D: Dispatcher, C: CacheClient> Dispatcher for CachedDispatcher<D, C> {
    async fn find_tenant_id_by_domain_name(
        &self,
        domain_name: &str,
    ) -> Result<String, DispatchError> {
        let key = self.key(domain_name);

        match self.cache.get_string(&key).await {
            Ok(Some(tenant_id)) => {
                debug!(domain = domain_name, "tenant cache hit");
                return Ok(tenant_id);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    error = %err,
                    backend = self.cache.backend_name(),
                    "tenant cache read failed; falling back to lookup"
                );
            }
        }

        let tenant_id = self.inner.find_tenant_id_by_domain_name(domain_name).await?;

        if let Err(err) = self.cache.set_with_ttl(&key, &tenant_id, self.ttl).await {
            warn!(
                error = %err,
                backend = self.cache.backend_name(),
                "tenant cache write failed"
            );
        }

        Ok(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::services::cache::CacheResult;

    #[derive(Clone, Default)]
    struct MemoryCache {
        entries: Arc<Mutex<HashMap<String, String>>>,
        broken: bool,
    }

    #[async_trait]
    impl CacheClient for MemoryCache {
        fn backend_name(&self) -> &'static str {
            "memory"
        }

        async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
            if self.broken {
                return Err(CacheError::BackendConnection("down".into()));
            }
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set_with_ttl(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
            if self.broken {
                return Err(CacheError::BackendConnection("down".into()));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&self, key: &str) -> CacheResult<u64> {
            Ok(self.entries.lock().unwrap().remove(key).map_or(0, |_| 1))
        }
    }

    #[derive(Clone, Default)]
    struct CountingDirectory {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Dispatcher for CountingDirectory {
        async fn find_tenant_id_by_domain_name(
            &self,
            domain_name: &str,
        ) -> Result<String, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match domain_name {
                "tenant-a" => Ok("uuid-a".to_string()),
                other => Err(DispatchError::NotFound(other.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let directory = CountingDirectory::default();
        let cached = CachedDispatcher::new(
            directory.clone(),
            MemoryCache::default(),
            Duration::from_secs(60),
        );

        for _ in 0..3 {
            let id = cached.find_tenant_id_by_domain_name("tenant-a").await.unwrap();
            assert_eq!(id, "uuid-a");
        }
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let directory = CountingDirectory::default();
        let cache = MemoryCache::default();
        let cached = CachedDispatcher::new(directory.clone(), cache.clone(), Duration::from_secs(60));

        for _ in 0..2 {
            assert!(matches!(
                cached.find_tenant_id_by_domain_name("unknown").await,
                Err(DispatchError::NotFound(_))
            ));
        }
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broken_cache_falls_through() {
        let directory = CountingDirectory::default();
        let cache = MemoryCache {
            broken: true,
            ..Default::default()
        };
        let cached = CachedDispatcher::new(directory.clone(), cache, Duration::from_secs(60));

        assert_eq!(
            cached.find_tenant_id_by_domain_name("tenant-a").await.unwrap(),
            "uuid-a"
        );
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_lookup() {
        let directory = CountingDirectory::default();
        let cached = CachedDispatcher::new(
            directory.clone(),
            MemoryCache::default(),
            Duration::from_secs(60),
        );

        cached.find_tenant_id_by_domain_name("tenant-a").await.unwrap();
        assert!(cached.invalidate("tenant-a").await.unwrap());
        assert!(!cached.invalidate("tenant-a").await.unwrap());
        cached.find_tenant_id_by_domain_name("tenant-a").await.unwrap();

        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }
}
