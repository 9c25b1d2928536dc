use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
