//! In-process cache over `cached::TimedSizedCache`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, TimedSizedCache};

use crate::cache::{AppCache, CacheError};

/// Size-bounded store where every entry expires `ttl` after insertion.
pub struct MemoryCache {
    store: Mutex<TimedSizedCache<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            store: Mutex::new(TimedSizedCache::with_size_and_lifespan(max_size, ttl)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TimedSizedCache<String, Vec<u8>>>, CacheError> {
        self.store
            .lock()
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}

#[async_trait]
impl AppCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.lock()?.cache_get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.lock()?.cache_set(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.cache_remove(key);
        Ok(())
    }
}
