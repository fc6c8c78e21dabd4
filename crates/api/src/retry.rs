use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RetryConfig;

/// Model calls made during ingestion that have no fallback value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCall {
    DocumentAnalysis,
    ChunkEmbedding,
}

impl ModelCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCall::DocumentAnalysis => "document_analysis",
            ModelCall::ChunkEmbedding => "chunk_embedding",
        }
    }
}

/// Capped exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    /// Wait before each retry, in order. Empty when retries are disabled.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_backoff.min(self.max_backoff)), move |d| {
            Some((*d * 2).min(self.max_backoff))
        })
        .take(self.max_retries)
    }

    pub async fn retry<F, Fut, T, E>(&self, call: ModelCall, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut delays = self.delays();
        let mut attempt = 1;

        loop {
            let err = match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(call = call.as_str(), attempts = attempt, "model call recovered");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            let Some(delay) = delays.next() else {
                warn!(call = call.as_str(), attempts = attempt, error = %err, "model call failed, giving up");
                return Err(err);
            };

            warn!(
                call = call.as_str(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "model call failed, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delays_double_up_to_cap() {
        let delays: Vec<u64> = RetryPolicy::new(4, 100, 250)
            .delays()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 250, 250]);

        assert_eq!(RetryPolicy::new(0, 100, 250).delays().count(), 0);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::new(2, 1, 2);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<&str, String> = policy
            .retry(ModelCall::DocumentAnalysis, || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("unavailable".to_string())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(1, 1, 1);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), String> = policy
            .retry(ModelCall::ChunkEmbedding, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unavailable".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "unavailable");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retries() {
        let policy = RetryPolicy::new(0, 1, 1);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), String> = policy
            .retry(ModelCall::ChunkEmbedding, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unavailable".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
