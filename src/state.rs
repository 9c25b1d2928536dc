//! Shared state handed to every handler through axum's `State` extractor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{CacheManager, PlanCache};
use crate::config::{JwtConfig, Settings};
use crate::db::AsyncDbPool;
use crate::repositories::Repositories;
use crate::services::{MailTransport, Services};

/// Cloning is cheap: services, the pool and the flag are all reference
/// counted.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Used directly by health checks
    pub db_pool: AsyncDbPool,
    pub jwt_config: JwtConfig,
    dispatch_running: Arc<AtomicBool>,
}

impl AppState {
    /// Wires repositories, the plan cache and every service from one pool.
    pub fn new(pool: AsyncDbPool, settings: &Settings, transport: Arc<dyn MailTransport>) -> Self {
        let repos = Repositories::new(pool.clone());
        let plan_cache = PlanCache::new(CacheManager::new(&settings.cache));
        let services = Services::new(
            repos,
            plan_cache,
            settings.plans.clone(),
            settings.dispatch.clone(),
            transport,
        );
        Self {
            services,
            db_pool: pool,
            jwt_config: settings.jwt.clone(),
            dispatch_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn dispatch_running(&self) -> bool {
        self.dispatch_running.load(Ordering::Relaxed)
    }

    pub fn set_dispatch_running(&self, running: bool) {
        self.dispatch_running.store(running, Ordering::Relaxed);
    }
}
