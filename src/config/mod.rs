//! Layered configuration for mailflow.
//!
//! # Priority (lowest to highest)
//! 1. `default.toml`
//! 2. `{environment}.toml`
//! 3. `local.toml`
//! 4. `MAILFLOW_*` environment variables (`__` separates nested keys)

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use loader::ConfigLoader;
pub use settings::{
    CacheConfig, DatabaseConfig, DispatchConfig, JwtConfig, PlanLimits, PlansConfig, Settings,
};
