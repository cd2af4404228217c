//! Bounded fixed-delay polling.
//!
//! [`poll`] calls a status fetcher until a caller-supplied predicate reports
//! a terminal status, the attempt budget runs out, or the run is cancelled.
//! Fetch errors are treated as transient and retried within the budget;
//! vendor-reported failure states are ordinary terminal statuses and are
//! returned to the caller unchanged.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::core::JobStatus;
use crate::errors::{ConfigError, JobError, PollError};

/// Attempt budget and fixed delay for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum number of status fetches.
    pub max_attempts: u32,
    /// Delay between fetches in milliseconds.
    pub delay_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 90,
            delay_ms: 10_000,
        }
    }
}

impl PollPolicy {
    /// Creates a policy.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Longest time the loop can wait in total.
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        self.delay() * self.max_attempts.saturating_sub(1)
    }

    /// Rejects a zero attempt budget.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                name,
                "0",
                "at least one attempt is required",
            ));
        }
        Ok(())
    }
}

/// Polls until `is_terminal` accepts a status.
///
/// `fetch` receives the 1-based attempt number. Cancellation is checked
/// before every attempt and raced against every delay; no delay follows the
/// final attempt.
pub async fn poll<F, Fut, P>(
    mut fetch: F,
    is_terminal: P,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<JobStatus, PollError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<JobStatus, JobError>>,
    P: Fn(&JobStatus) -> bool,
{
    let delay = policy.delay();
    let mut last_status: Option<JobStatus> = None;
    let mut last_error: Option<String> = None;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled {
                attempts,
                reason: cancel.reason(),
            });
        }

        attempts += 1;
        match fetch(attempts).await {
            Ok(status) if is_terminal(&status) => {
                debug!(attempt = attempts, status = %status.describe(), "Terminal status observed");
                return Ok(status);
            }
            Ok(status) => {
                debug!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    status = %status.describe(),
                    "Job not finished"
                );
                last_status = Some(status);
            }
            Err(e) => {
                warn!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Status fetch failed, will retry"
                );
                last_error = Some(e.to_string());
            }
        }

        if attempts < policy.max_attempts {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    return Err(PollError::Cancelled {
                        attempts,
                        reason: cancel.reason(),
                    });
                }
            }
        }
    }

    Err(PollError::Timeout {
        attempts,
        delay,
        last_status,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobState, Vendor};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(max_attempts: u32, delay_secs: u64) -> PollPolicy {
        PollPolicy::new(max_attempts, Duration::from_secs(delay_secs))
    }

    #[test]
    fn test_policy_budget() {
        let p = policy(24, 5);
        assert_eq!(p.delay(), Duration::from_secs(5));
        assert_eq!(p.total_budget(), Duration::from_secs(115));
        assert!(p.validate("LOOK_POLL_MAX_ATTEMPTS").is_ok());
        assert!(p.with_max_attempts(0).validate("LOOK_POLL_MAX_ATTEMPTS").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_on_third_call() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let status = poll(
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 3 {
                        Ok(JobStatus::completed().with_result_url("https://v/1.mp4"))
                    } else {
                        Ok(JobStatus::new(JobState::Processing))
                    }
                }
            },
            |s| Vendor::HeyGenVideo.is_terminal(s),
            &policy(10, 10),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(status.result_url.as_deref(), Some("https://v/1.mp4"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_exact_attempts() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let err = poll(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(JobStatus::new(JobState::Pending).with_raw_status("queued")) }
            },
            |s| Vendor::ShotstackRender.is_terminal(s),
            &policy(4, 5),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        let PollError::Timeout {
            attempts,
            last_status,
            ..
        } = &err
        else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(*attempts, 4);
        assert_eq!(last_status.as_ref().unwrap().state, JobState::Pending);
        assert_eq!(
            err.to_string(),
            "No terminal status after 4 attempts at 5s intervals (last status: pending (queued))"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_are_retried() {
        let cancel = CancellationToken::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let status = poll(
            |attempt| {
                seen.lock().push(attempt);
                async move {
                    if attempt < 3 {
                        Err(JobError::transport("connection reset"))
                    } else {
                        Ok(JobStatus::failed("render error"))
                    }
                }
            },
            |s| Vendor::ShotstackRender.is_terminal(s),
            &policy(5, 1),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(status.state, JobState::Failed);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_last_error() {
        let cancel = CancellationToken::new();
        let err = poll(
            |_| async { Err(JobError::http(503, "unavailable")) },
            |s: &JobStatus| s.is_terminal(),
            &policy(2, 1),
            &cancel,
        )
        .await
        .unwrap_err();

        let PollError::Timeout { last_error, last_status, .. } = err else {
            panic!("expected timeout");
        };
        assert!(last_status.is_none());
        assert_eq!(last_error.as_deref(), Some("HTTP 503: unavailable"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel("user stopped");

        let err = poll(
            |_| async { Ok(JobStatus::completed()) },
            |s: &JobStatus| s.is_terminal(),
            &policy(3, 1),
            &cancel,
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            PollError::Cancelled {
                attempts: 0,
                reason: Some("user stopped".to_string())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let cancel = Arc::new(CancellationToken::new());
        let trigger = cancel.clone();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel("stop");
        });

        let err = poll(
            |_| async { Ok(JobStatus::new(JobState::Processing)) },
            |s: &JobStatus| s.is_terminal(),
            &policy(10, 60),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
