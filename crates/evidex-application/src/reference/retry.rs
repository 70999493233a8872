//! Bounded retry for upstream calls.
//!
//! Attempts are immediate and use identical inputs. Only errors that report
//! themselves retryable are repeated; anything else is returned at once.

use evidex_core::error::{EvidexError, Result};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or the budget
    /// is spent. The closure receives the zero-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<EvidexError> = None;

        for attempt in 0..=self.max_retries {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(operation = label, attempt, "Upstream recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        operation = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts(),
                        error = %e,
                        "Upstream attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(EvidexError::UpstreamExhausted {
            attempts: self.max_attempts(),
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
