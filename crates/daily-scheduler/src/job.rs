//! Job trait

use async_trait::async_trait;

pub type JobResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Body of a scheduled job
///
/// Jobs must be idempotent with respect to their own output: a retried or
/// caught-up run overwrites what an earlier run produced.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self) -> JobResult;
}
