use async_trait::async_trait;

use crate::cache::{AppCache, CacheError};

/// Stores nothing. Used when `cache.enabled = false`.
#[derive(Debug, Default)]
pub struct NoOpCache;

#[async_trait]
impl AppCache for NoOpCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}
