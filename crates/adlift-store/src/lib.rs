//! Job store - the single mutation choke point
//!
//! Every job/slot mutation in the system goes through a `JobStore`
//! implementation, and every status change is a compare-and-set against
//! the caller's expected previous status. That one discipline is what
//! makes concurrent workers and concurrent rollback evaluation safe
//! without a global lock.

pub mod memory;

pub use memory::MemoryJobStore;

use adlift_model::{
    CreationRequest, ExternalId, IdempotencyKey, Job, JobId, JobStatus, ModelError, Slot,
    SlotError, SlotId, SlotStatus,
};

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No job with the given id
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// No slot with the given id
    #[error("slot not found: {0}")]
    SlotNotFound(SlotId),

    /// Slot was not in the expected status; another worker won the race
    #[error("slot conflict: expected {expected:?}, found {actual:?}")]
    SlotConflict {
        /// Status the caller expected
        expected: SlotStatus,
        /// Status actually found
        actual: SlotStatus,
    },

    /// Job was not in the expected status
    #[error("job conflict: expected {expected:?}, found {actual:?}")]
    JobConflict {
        /// Status the caller expected
        expected: JobStatus,
        /// Status actually found
        actual: JobStatus,
    },

    /// Transition passed the compare-and-set but failed the legality table
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Durable record keeping for jobs and their slots
///
/// `create_job` is idempotent on the key: resubmission returns the
/// original job with no new slots. The transition methods are
/// compare-and-set; a `conflict` result means another caller already
/// moved the row and the loser must re-read and re-decide.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically create a job row plus one pending slot per requested
    /// entity, parent links wired. Returns `(job, false)` when the
    /// idempotency key already exists.
    async fn create_job(
        &self,
        request: &CreationRequest,
        key: &IdempotencyKey,
        retry_budget: u32,
    ) -> Result<(Job, bool), StoreError>;

    /// Fetch a job by id
    async fn job(&self, id: JobId) -> Result<Job, StoreError>;

    /// Fetch all slots of a job, in creation order
    async fn slots(&self, job_id: JobId) -> Result<Vec<Slot>, StoreError>;

    /// Fetch a slot by id
    async fn slot(&self, id: SlotId) -> Result<Slot, StoreError>;

    /// Compare-and-set slot transition; returns the updated slot
    async fn transition_slot(
        &self,
        id: SlotId,
        from: SlotStatus,
        to: SlotStatus,
        external_id: Option<ExternalId>,
        error: Option<SlotError>,
    ) -> Result<Slot, StoreError>;

    /// Compare-and-set job transition; returns the updated job
    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, StoreError>;

    /// Atomically consume one unit of the job-wide retry budget.
    /// Returns false when the budget is already exhausted.
    async fn try_consume_retry(&self, id: JobId) -> Result<bool, StoreError>;

    /// Append a failure reason to the job record
    async fn add_failure_reason(&self, id: JobId, reason: String) -> Result<(), StoreError>;

    /// Record an error against a slot without changing its status.
    /// Used by verification to annotate discrepant `created` slots.
    async fn record_slot_error(&self, id: SlotId, error: SlotError) -> Result<(), StoreError>;
}
