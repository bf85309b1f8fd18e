//! Model calls with timeout and retry.
//!
//! Every call is bounded by `api_timeout_secs`; an unbounded remote hang on
//! one page would otherwise block the whole résumé run.
//!
//! ## Retry Strategy
//!
//! Only transient errors (see [`ModelError::is_transient`]) are retried, with
//! exponential backoff `retry_backoff_ms * 2^(attempt-1)`: 500 ms → 1 s → 2 s
//! with the defaults. A `Retry-After` hint from a 429 replaces the computed
//! delay when it is longer, capped at [`MAX_RETRY_AFTER_SECS`].

use crate::config::PipelineConfig;
use crate::error::ModelError;
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tracing::warn;

pub const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Retry and timeout settings for model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

impl RetryPolicy {
    fn delay_before(&self, attempt: u32, last_err: Option<&ModelError>) -> Duration {
        let backoff = self.backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
        let hinted = match last_err {
            Some(ModelError::RateLimited {
                retry_after_secs: Some(secs),
            }) => (*secs).min(MAX_RETRY_AFTER_SECS) * 1000,
            _ => 0,
        };
        Duration::from_millis(backoff.max(hinted))
    }
}

/// Run one model call under the policy's timeout.
pub async fn with_timeout<Fut>(timeout_secs: u64, call: Fut) -> Result<String, ModelError>
where
    Fut: Future<Output = Result<String, ModelError>>,
{
    match timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(result) => result,
        Err(_) => Err(ModelError::Timeout {
            secs: timeout_secs,
        }),
    }
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
///
/// `label` names the call in log lines (e.g. `Page 2`).
pub async fn call_with_retry<F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut call: F,
) -> Result<String, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ModelError>>,
{
    let mut last_err: Option<ModelError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay_before(attempt, last_err.as_ref());
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                delay.as_millis()
            );
            sleep(delay).await;
        }

        match with_timeout(policy.timeout_secs, call()).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or(ModelError::EmptyResponse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_ms: 1,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let out = call_with_retry(&policy(3), "Page 1", || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ModelError::Network("reset".into()))
                } else {
                    Ok("done".to_string())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let err = call_with_retry(&policy(3), "Page 1", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(ModelError::Auth {
                    detail: "bad key".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ModelError::Auth { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let err = call_with_retry(&policy(2), "Page 1", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(ModelError::Api {
                    status: 503,
                    message: "overloaded".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ModelError::Api { status: 503, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out() {
        let err = with_timeout(2, async {
            sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ModelError::Timeout { secs: 2 }));
    }

    #[test]
    fn backoff_doubles_and_honours_retry_after() {
        let p = RetryPolicy {
            max_retries: 3,
            backoff_ms: 500,
            timeout_secs: 60,
        };
        assert_eq!(p.delay_before(1, None), Duration::from_millis(500));
        assert_eq!(p.delay_before(3, None), Duration::from_millis(2000));
        let hinted = ModelError::RateLimited {
            retry_after_secs: Some(5),
        };
        assert_eq!(p.delay_before(1, Some(&hinted)), Duration::from_secs(5));
        let huge = ModelError::RateLimited {
            retry_after_secs: Some(10_000),
        };
        assert_eq!(
            p.delay_before(1, Some(&huge)),
            Duration::from_secs(MAX_RETRY_AFTER_SECS)
        );
    }
}
