//! Caller-facing status reports
//!
//! The surrounding application polls `Orchestrator::job_status`; there
//! is no push interface. Everything the caller may need to act on is in
//! the report: totals and per-kind counts, shortfalls, discrepancies,
//! and residual cleanup entries. Never a raw remote error.

use adlift_model::{
    EntityKind, ExternalId, Job, JobStatus, Slot, SlotErrorKind, SlotId, SlotStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rollback::is_discrepant;

/// A requested entity that does not exist at job end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntity {
    /// Slot that should have produced it
    pub slot_id: SlotId,
    /// Entity kind
    pub kind: EntityKind,
    /// Position within its kind
    pub index: usize,
    /// Why it is missing
    pub reason: String,
}

/// A created entity the rollback could not delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualEntity {
    /// Slot the entity belongs to
    pub slot_id: SlotId,
    /// Entity kind
    pub kind: EntityKind,
    /// Remote id, for manual cleanup
    pub external_id: ExternalId,
    /// Delete failure detail
    pub error: String,
}

/// Slot tallies for one entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindCounts {
    /// Slots in `created`
    pub created: usize,
    /// Slots in `failed_permanent`
    pub failed: usize,
    /// Slots not yet attempt-terminal
    pub pending: usize,
    /// Slots in `rolled_back`
    pub rolled_back: usize,
}

/// Snapshot of a job for the polling caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    /// Job status
    pub status: JobStatus,
    /// Slots in `created`
    pub slots_created: usize,
    /// Slots in `failed_permanent`
    pub slots_failed: usize,
    /// Slots not yet attempt-terminal (`pending`, `creating`, `failed_transient`)
    pub slots_pending: usize,
    /// Slots in `rolled_back`
    pub slots_rolled_back: usize,
    /// Tallies broken down by entity kind
    pub per_kind: BTreeMap<EntityKind, KindCounts>,
    /// Created slots whose remote existence could not be confirmed
    pub discrepancies: Vec<SlotId>,
    /// Requested entities that do not exist; populated on partial completion
    pub missing: Vec<MissingEntity>,
    /// Created entities a rollback failed to delete; manual follow-up
    pub residuals: Vec<ResidualEntity>,
    /// Retries consumed against the job-wide budget
    pub retries_used: u32,
    /// Failure reasons: eligibility refusals, cancellation, residuals
    pub failure_reasons: Vec<String>,
}

impl JobStatusReport {
    /// Build a report from the job row and its slots
    #[must_use]
    pub fn build(job: &Job, slots: &[Slot]) -> Self {
        let mut created = 0;
        let mut failed = 0;
        let mut pending = 0;
        let mut rolled_back = 0;
        let mut per_kind: BTreeMap<EntityKind, KindCounts> = BTreeMap::new();
        let mut discrepancies = Vec::new();
        let mut residuals = Vec::new();

        for slot in slots {
            let kind = per_kind.entry(slot.kind).or_default();
            match slot.status {
                SlotStatus::Created => {
                    created += 1;
                    kind.created += 1;
                    if is_discrepant(slot) {
                        discrepancies.push(slot.id);
                    }
                    if let Some(residual) = residual_of(slot) {
                        residuals.push(residual);
                    }
                }
                SlotStatus::FailedPermanent => {
                    failed += 1;
                    kind.failed += 1;
                }
                SlotStatus::Pending | SlotStatus::Creating | SlotStatus::FailedTransient => {
                    pending += 1;
                    kind.pending += 1;
                }
                SlotStatus::RolledBack => {
                    rolled_back += 1;
                    kind.rolled_back += 1;
                }
            }
        }

        let missing = if job.status == JobStatus::CompletedPartial {
            slots
                .iter()
                .filter(|s| {
                    s.kind != EntityKind::Campaign
                        && !(s.status == SlotStatus::Created && !is_discrepant(s))
                })
                .map(|s| MissingEntity {
                    slot_id: s.id,
                    kind: s.kind,
                    index: s.index,
                    reason: s.last_error.as_ref().map_or_else(
                        || "never attempted: parent was not created".to_string(),
                        |e| e.message.clone(),
                    ),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            status: job.status,
            slots_created: created,
            slots_failed: failed,
            slots_pending: pending,
            slots_rolled_back: rolled_back,
            per_kind,
            discrepancies,
            missing,
            residuals,
            retries_used: job.retries_used,
            failure_reasons: job.failure_reasons.clone(),
        }
    }
}

/// A `created` slot carrying a `RollbackFailed` error is a residual:
/// the compensating delete ran and failed, the entity still exists.
fn residual_of(slot: &Slot) -> Option<ResidualEntity> {
    let error = slot.last_error.as_ref()?;
    if error.kind != SlotErrorKind::RollbackFailed {
        return None;
    }
    let external_id = slot.external_id.clone()?;
    Some(ResidualEntity {
        slot_id: slot.id,
        kind: slot.kind,
        external_id,
        error: error.message.clone(),
    })
}
