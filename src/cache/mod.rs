//! Pluggable key/value caching.
//!
//! [`CacheManager`] is built once from `[cache]` settings and handed to the
//! services that need it; [`PlanCache`] layers the plan/usage lookups on top.

mod error;
mod manager;
mod memory;
mod noop;
mod plan_cache;
mod traits;

pub use error::CacheError;
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use noop::NoOpCache;
pub use plan_cache::PlanCache;
pub use traits::AppCache;
