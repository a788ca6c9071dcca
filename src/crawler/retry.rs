//! Retry wrapper for frontier operations

use crate::frontier::FrontierResult;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with linear backoff for transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRetry {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for StoreRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl StoreRetry {
    /// Runs `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent
    pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> FrontierResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FrontierResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= self.attempts.max(1) => return Err(e),
                Err(e) => {
                    tracing::warn!(op = name, attempt, error = %e, "Store operation failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
