//! Retry policy
//!
//! Pure decision logic: error classification and backoff arithmetic.
//! No I/O. The job-wide retry budget itself lives on the job row and is
//! consumed through the store's atomic `try_consume_retry`.

use crate::remote::{RemoteError, RemoteErrorKind};
use rand::Rng;
use std::time::Duration;

/// Outcome of classifying a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying under the job budget
    Transient,
    /// Retrying cannot help
    Permanent,
}

/// Classification and backoff policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base: Duration,
    cap: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given backoff base and ceiling
    #[inline]
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Classify a remote failure
    #[must_use]
    pub fn classify(&self, err: &RemoteError) -> FailureClass {
        match err.kind {
            RemoteErrorKind::RateLimited
            | RemoteErrorKind::Timeout
            | RemoteErrorKind::ServerError => FailureClass::Transient,
            RemoteErrorKind::Validation
            | RemoteErrorKind::Permission
            | RemoteErrorKind::Duplicate => FailureClass::Permanent,
        }
    }

    /// Delay before the next attempt
    ///
    /// Exponential with jitter: `base * 2^attempt + random(0, base)`,
    /// capped. A server-supplied retry-after hint is honored as given;
    /// the cap bounds only the computed delay.
    #[must_use]
    pub fn next_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let base_ms = self.base.as_millis() as u64;
        let exp = base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let jitter = if base_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=base_ms)
        };
        Duration::from_millis(exp.saturating_add(jitter)).min(self.cap)
    }
}
