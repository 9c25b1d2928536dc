use async_trait::async_trait;

use crate::cache::CacheError;

/// Byte-oriented key/value store behind [`CacheManager`](crate::cache::CacheManager).
#[async_trait]
pub trait AppCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}
