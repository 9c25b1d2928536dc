//! Typed access to the configured cache backend.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::memory::MemoryCache;
use crate::cache::noop::NoOpCache;
use crate::cache::{AppCache, CacheError};
use crate::config::CacheConfig;

/// Cheap-to-clone handle over one backend, built at startup and injected
/// wherever caching is needed.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn AppCache>,
    enabled: bool,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            backend: Arc::new(MemoryCache::new(
                config.max_size,
                Duration::from_secs(config.ttl_seconds),
            )),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: Arc::new(NoOpCache),
            enabled: false,
        }
    }

    pub fn with_backend(backend: Arc<dyn AppCache>) -> Self {
        Self {
            backend,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.backend.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.set(key, bytes).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend.remove(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_round_trip_through_memory_backend() {
        let cache = CacheManager::new(&CacheConfig::default());
        cache.set_json("k", &vec![1_i64, 2, 3]).await.unwrap();
        let value: Option<Vec<i64>> = cache.get_json("k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = CacheManager::new(&config);
        assert!(!cache.is_enabled());
        cache.set_json("k", &1_i64).await.unwrap();
        let value: Option<i64> = cache.get_json("k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_serialization_error() {
        let backend = Arc::new(MemoryCache::new(4, Duration::from_secs(60)));
        backend.set("k", b"not json".to_vec()).await.unwrap();
        let cache = CacheManager::with_backend(backend);
        let result: Result<Option<i64>, _> = cache.get_json("k").await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }
}
