use chirp_core::{CoreError, ErrorExt};
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Total time budget across all attempts
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Retry policy tuned for the platform search/post endpoints.
    pub fn platform() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 20000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            max_elapsed: Duration::from_secs(45),
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then attempt again
    RetryAfter(Duration),
    /// Give up; the error is permanent or the budget is spent
    Abort,
}

/// Decides whether a failed attempt should be retried.
///
/// Pure in (error kind, attempt count, elapsed time) apart from jitter, so
/// retry behavior is testable without timers. `attempt` is zero-based: the
/// attempt that just failed. Rate-limit errors always abort here; the reset
/// delay belongs to the next scheduled run, not an in-run sleep.
pub fn decide(
    error: &CoreError,
    attempt: u32,
    elapsed: Duration,
    policy: &RetryPolicy,
) -> RetryDecision {
    if attempt + 1 >= policy.max_attempts || elapsed >= policy.max_elapsed {
        return RetryDecision::Abort;
    }

    if error.is_retryable() {
        RetryDecision::RetryAfter(calculate_delay(attempt, policy))
    } else {
        RetryDecision::Abort
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponential_delay = if attempt == 0 {
        Duration::from_millis(policy.base_delay_ms)
    } else {
        let multiplier = policy.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (policy.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(policy.max_delay_ms))
    };

    // Jitter prevents synchronized retries across scheduled runs
    let jitter_range = (exponential_delay.as_millis() as f64 * policy.jitter_factor) as u64;
    let jitter = if jitter_range == 0 {
        0
    } else {
        fastrand::u64(0..=jitter_range)
    };

    (exponential_delay + Duration::from_millis(jitter))
        .min(Duration::from_millis(policy.max_delay_ms))
}
