//! Job record and its status state machine
//!
//! A job is one user-initiated bulk-creation request. Its status moves
//! monotonically through the pipeline; the only branches are the
//! partial/rollback/failed terminals. A job never re-enters `pending`.

use crate::error::ModelError;
use crate::ids::{AccountRef, IdempotencyKey, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Job status state machine
///
/// `pending → verifying_eligibility → in_progress → verifying_result →
/// {completed | completed_partial | rolled_back}`, with `failed`
/// reachable from the eligibility gate and from cancellation, and
/// `failed → rolled_back` permitted so post-cancellation compensation
/// lands in a compensated terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, nothing attempted yet
    Pending,
    /// Pre-flight account checks running
    VerifyingEligibility,
    /// Creator worker pool is driving slots
    InProgress,
    /// All slots terminal, remote existence re-check running
    VerifyingResult,
    /// Every requested entity created and confirmed
    Completed,
    /// Campaign confirmed, some child entities missing and reported
    CompletedPartial,
    /// Created entities were compensated by deletion
    RolledBack,
    /// Aborted: eligibility refusal or cancellation
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal status
    ///
    /// `Failed` is terminal for the caller; internally the rollback
    /// coordinator may still move it to `RolledBack` after cancellation.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedPartial | Self::RolledBack | Self::Failed
        )
    }

    /// Check if transition from this status to target is valid
    #[must_use]
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, target),
            (Pending, VerifyingEligibility)
                | (VerifyingEligibility, InProgress)
                | (VerifyingEligibility, Failed)
                | (InProgress, VerifyingResult)
                | (InProgress, Failed)
                | (VerifyingResult, Completed)
                | (VerifyingResult, CompletedPartial)
                | (VerifyingResult, RolledBack)
                | (Failed, RolledBack)
        )
    }
}

/// Entity counts a job was asked to produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedCounts {
    /// Always exactly one campaign
    pub campaigns: usize,
    /// Number of ad set duplicates (0–49)
    pub ad_sets: usize,
    /// Ads requested per ad set index
    pub ads_per_ad_set: BTreeMap<usize, usize>,
}

impl RequestedCounts {
    /// Total number of slots these counts expand to
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.campaigns + self.ad_sets + self.ads_per_ad_set.values().sum::<usize>()
    }
}

/// One bulk-creation request and its durable progress record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Caller-supplied dedup token; unique across jobs
    pub idempotency_key: IdempotencyKey,
    /// Target ad account
    pub account: AccountRef,
    /// Current status
    pub status: JobStatus,
    /// Entity counts requested
    pub requested: RequestedCounts,
    /// Refuse partial results and compensate instead
    pub all_or_nothing: bool,
    /// Job-wide cap on retries across all slots combined
    pub retry_budget: u32,
    /// Retries consumed so far; monotonically increasing
    pub retries_used: u32,
    /// Reasons attached on failure (eligibility refusal, cancellation)
    pub failure_reasons: Vec<String>,
    /// When the job row was created
    pub created_at: DateTime<Utc>,
    /// When the job left `pending`
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new job in `Pending`
    #[must_use]
    pub fn new(
        id: JobId,
        idempotency_key: IdempotencyKey,
        account: AccountRef,
        requested: RequestedCounts,
        all_or_nothing: bool,
        retry_budget: u32,
    ) -> Self {
        Self {
            id,
            idempotency_key,
            account,
            status: JobStatus::Pending,
            requested,
            all_or_nothing,
            retry_budget,
            retries_used: 0,
            failure_reasons: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition to a new status, enforcing the legality table
    pub fn transition(&mut self, to: JobStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(to) {
            return Err(ModelError::IllegalJobTransition {
                from: self.status,
                to,
            });
        }
        if self.status == JobStatus::Pending {
            self.started_at = Some(Utc::now());
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Remaining retry budget
    #[inline]
    #[must_use]
    pub fn retries_remaining(&self) -> u32 {
        self.retry_budget.saturating_sub(self.retries_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job() -> Job {
        Job::new(
            JobId::new(),
            IdempotencyKey::new("key-1"),
            AccountRef::new("act_1"),
            RequestedCounts {
                campaigns: 1,
                ad_sets: 3,
                ads_per_ad_set: BTreeMap::from([(0, 1), (1, 1), (2, 1)]),
            },
            false,
            5,
        )
    }

    #[test]
    fn happy_path_transitions() {
        let mut j = job();
        assert!(j.transition(JobStatus::VerifyingEligibility).is_ok());
        assert!(j.started_at.is_some());
        assert!(j.transition(JobStatus::InProgress).is_ok());
        assert!(j.transition(JobStatus::VerifyingResult).is_ok());
        assert!(j.transition(JobStatus::Completed).is_ok());
        assert!(j.status.is_terminal());
        assert!(j.completed_at.is_some());
    }

    #[test]
    fn no_reentry_to_pending() {
        let mut j = job();
        j.transition(JobStatus::VerifyingEligibility).unwrap();
        assert!(j.transition(JobStatus::Pending).is_err());
    }

    #[test]
    fn eligibility_refusal_fails_job() {
        let mut j = job();
        j.transition(JobStatus::VerifyingEligibility).unwrap();
        assert!(j.transition(JobStatus::Failed).is_ok());
    }

    #[test]
    fn cancelled_job_can_be_compensated() {
        let mut j = job();
        j.transition(JobStatus::VerifyingEligibility).unwrap();
        j.transition(JobStatus::InProgress).unwrap();
        j.transition(JobStatus::Failed).unwrap();
        assert!(j.transition(JobStatus::RolledBack).is_ok());
    }

    #[test]
    fn completed_is_final() {
        let mut j = job();
        j.transition(JobStatus::VerifyingEligibility).unwrap();
        j.transition(JobStatus::InProgress).unwrap();
        j.transition(JobStatus::VerifyingResult).unwrap();
        j.transition(JobStatus::Completed).unwrap();
        assert!(j.transition(JobStatus::RolledBack).is_err());
    }

    #[test]
    fn requested_counts_total() {
        let counts = RequestedCounts {
            campaigns: 1,
            ad_sets: 3,
            ads_per_ad_set: BTreeMap::from([(0, 2), (1, 1), (2, 1)]),
        };
        assert_eq!(counts.total(), 8);
    }

    #[test]
    fn retries_remaining_saturates() {
        let mut j = job();
        j.retries_used = 7;
        assert_eq!(j.retries_remaining(), 0);
    }
}
