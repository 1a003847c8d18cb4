use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to start extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Extractor timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extractor produced no usable output: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name of the extractor
    fn name(&self) -> &'static str;

    /// Fetch the full metadata document for the given URL
    async fn extract(&self, url: &str) -> Result<Value, ExtractError>;
}
