//! Sequential retry with exponential backoff for rate-limited services.
//!
//! Rate-limit failures wait `base · 2^attempt`; any other failure waits a
//! short fixed delay. After the last attempt the error is handed back so
//! the caller can record it on the item and move on.

use std::future::Future;
use std::time::Duration;

use mechanyx_config::RetryConfig;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub error_delay: Duration,
    markers: Vec<String>,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: Duration::from_secs_f64(cfg.backoff_base_secs.max(0.0)),
            error_delay: Duration::from_secs_f64(cfg.error_delay_secs.max(0.0)),
            markers: cfg.rate_limit_markers.iter().map(|m| m.to_ascii_lowercase()).collect(),
        }
    }
}

impl RetryPolicy {
    pub fn is_rate_limited(&self, message: &str) -> bool {
        let message = message.to_ascii_lowercase();
        self.markers.iter().any(|m| message.contains(m.as_str()))
    }

    /// Delay before the attempt after `attempt` (0-based) failed.
    pub fn delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        if rate_limited {
            self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
        } else {
            self.error_delay
        }
    }
}

/// Final failure after every attempt was used.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    pub message: String,
    pub attempts: u32,
    pub rate_limited: bool,
}

/// Run `op` until it succeeds or attempts run out.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let message = err.to_string();
                let rate_limited = policy.is_rate_limited(&message);
                if attempt + 1 >= policy.max_attempts {
                    return Err(RetryFailure { message, attempts: attempt + 1, rate_limited });
                }
                let wait = policy.delay(attempt, rate_limited);
                warn!(
                    item = label,
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    rate_limited,
                    wait_ms = wait.as_millis() as u64,
                    error = %message,
                    "Retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        let cfg = RetryConfig {
            max_attempts,
            backoff_base_secs: 0.0,
            error_delay_secs: 0.0,
            ..Default::default()
        };
        RetryPolicy::from(&cfg)
    }

    #[test]
    fn test_rate_limit_markers() {
        let p = policy(3);
        assert!(p.is_rate_limited("HTTP status client error (429 Too Many Requests)"));
        assert!(p.is_rate_limited("Quota exceeded"));
        assert!(!p.is_rate_limited("connection reset"));
    }

    #[test]
    fn test_backoff_doubles() {
        let cfg = RetryConfig { backoff_base_secs: 1.0, error_delay_secs: 0.5, ..Default::default() };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.delay(0, true), Duration::from_secs(1));
        assert_eq!(p.delay(2, true), Duration::from_secs(4));
        assert_eq!(p.delay(2, false), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = with_retry(&policy(3), "v1", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("429 rate limit")
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(out, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_and_reports() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<(), RetryFailure> = with_retry(&policy(2), "v2", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        })
        .await;
        let failure = out.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert!(!failure.rate_limited);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
