//! Cache-aside lookups for plan tier and resource usage.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::error::AppResult;
use crate::models::{Usage, UserPlan};

/// Reads through the cache to a loader on miss, then stores the loaded value.
///
/// Cache failures never fail the request: they are logged and the loader
/// result is returned as-is.
#[derive(Clone)]
pub struct PlanCache {
    cache: CacheManager,
}

fn plan_key(user_id: Uuid) -> String {
    format!("plan:{}", user_id)
}

fn usage_key(user_id: Uuid) -> String {
    format!("usage:{}", user_id)
}

impl PlanCache {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    pub async fn plan<F, Fut>(&self, user_id: Uuid, load: F) -> AppResult<UserPlan>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<UserPlan>>,
    {
        self.get_or_load(&plan_key(user_id), load).await
    }

    pub async fn usage<F, Fut>(&self, user_id: Uuid, load: F) -> AppResult<Usage>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Usage>>,
    {
        self.get_or_load(&usage_key(user_id), load).await
    }

    pub async fn invalidate_usage(&self, user_id: Uuid) {
        self.evict(&usage_key(user_id)).await;
    }

    async fn get_or_load<T, F, Fut>(&self, key: &str, load: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.cache.get_json::<T>(key).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "Cache read failed"),
        }

        let value = load().await?;
        if let Err(e) = self.cache.set_json(key, &value).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    async fn evict(&self, key: &str) {
        if let Err(e) = self.cache.remove(key).await {
            tracing::warn!(key, error = %e, "Cache eviction failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plan_cache() -> PlanCache {
        PlanCache::new(CacheManager::new(&CacheConfig::default()))
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let cache = plan_cache();
        let user = Uuid::new_v4();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let usage = cache
                .usage(user, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Usage {
                        uploads: 1,
                        templates: 2,
                        campaigns: 0,
                    })
                })
                .await
                .unwrap();
            assert_eq!(usage.templates, 2);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_reload() {
        let cache = plan_cache();
        let user = Uuid::new_v4();

        let first = cache
            .usage(user, || async { Ok(Usage::default()) })
            .await
            .unwrap();
        assert_eq!(first.uploads, 0);

        cache.invalidate_usage(user).await;
        let second = cache
            .usage(user, || async {
                Ok(Usage {
                    uploads: 1,
                    ..Usage::default()
                })
            })
            .await
            .unwrap();
        assert_eq!(second.uploads, 1);
    }

    #[tokio::test]
    async fn plan_and_usage_keys_are_separate() {
        let cache = plan_cache();
        let user = Uuid::new_v4();

        cache.plan(user, || async { Ok(UserPlan::Pro) }).await.unwrap();
        cache.invalidate_usage(user).await;
        let plan = cache
            .plan(user, || async { Ok(UserPlan::Free) })
            .await
            .unwrap();
        assert_eq!(plan, UserPlan::Pro);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = plan_cache();
        let user = Uuid::new_v4();

        let failed = cache
            .plan(user, || async { Err(crate::error::AppError::bad_request("boom")) })
            .await;
        assert!(failed.is_err());

        let plan = cache.plan(user, || async { Ok(UserPlan::Free) }).await.unwrap();
        assert_eq!(plan, UserPlan::Free);
    }
}
