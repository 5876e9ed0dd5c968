//! Engine configuration
//!
//! All of the timing and sizing knobs in one place. The defaults are
//! starting points, not tuned production values; operators are expected
//! to set them per account rate limit.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed worker pool size; bounds concurrent remote calls per job
    pub worker_count: usize,
    /// Backoff base delay
    pub backoff_base: Duration,
    /// Backoff ceiling
    pub backoff_cap: Duration,
    /// Job-wide retry budget unless the request overrides it
    pub default_retry_budget: u32,
    /// Minimum account age accepted by the eligibility gate
    pub min_account_age_days: u32,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With worker pool size
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// With backoff base and cap
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// With default retry budget
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.default_retry_budget = budget;
        self
    }

    /// With minimum account age
    #[inline]
    #[must_use]
    pub fn with_min_account_age_days(mut self, days: u32) -> Self {
        self.min_account_age_days = days;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            backoff_base: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(30),
            default_retry_budget: 5,
            min_account_age_days: 0,
        }
    }
}
