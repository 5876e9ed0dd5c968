//! Rollback coordination
//!
//! Decides, from final slot states and the verification snapshot,
//! whether a job's result is acceptable as-is, acceptable with a
//! reported shortfall, or must be compensated by deleting everything
//! that was created. Deletion runs in reverse dependency order (ads,
//! ad sets, campaign) and is best effort: one stuck delete never blocks
//! the siblings, it lands on the residual list for manual follow-up.

use crate::error::EngineError;
use crate::remote::EntityCreationApi;
use crate::report::{MissingEntity, ResidualEntity};
use adlift_model::{
    EntityKind, Job, JobId, Slot, SlotError, SlotErrorKind, SlotId, SlotStatus,
    VerificationResult,
};
use adlift_store::JobStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Terminal decision for a finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Every requested entity created and confirmed
    Accept,
    /// Campaign confirmed; listed child entities are missing
    AcceptPartial {
        /// Requested entities that do not exist
        missing: Vec<MissingEntity>,
    },
    /// Compensate by deleting everything created
    Rollback {
        /// Why the result is not acceptable
        reason: String,
    },
}

/// Outcome of executing a rollback
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RollbackReport {
    /// Slots whose entities were deleted
    pub rolled_back: Vec<SlotId>,
    /// Entities that could not be deleted; manual follow-up required
    pub residuals: Vec<ResidualEntity>,
}

/// Accept / accept-partial / compensate coordinator
pub struct RollbackCoordinator {
    store: Arc<dyn JobStore>,
    api: Arc<dyn EntityCreationApi>,
}

impl RollbackCoordinator {
    /// Create a coordinator over the given store and remote API
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, api: Arc<dyn EntityCreationApi>) -> Self {
        Self { store, api }
    }

    /// Decide the job's fate from terminal slot states and verification
    ///
    /// The campaign slot is the keystone: if it is not created and
    /// confirmed, no coherent result exists and the only option is
    /// rollback. With a confirmed campaign, shortfalls are reported
    /// (`AcceptPartial`) unless the request was all-or-nothing.
    #[must_use]
    pub fn evaluate(
        &self,
        job: &Job,
        slots: &[Slot],
        verification: &VerificationResult,
    ) -> Decision {
        let discrepant: HashSet<SlotId> = verification.discrepancies.iter().copied().collect();
        let confirmed_created =
            |slot: &Slot| slot.status == SlotStatus::Created && !discrepant.contains(&slot.id);

        let campaign_ok = slots
            .iter()
            .any(|s| s.kind == EntityKind::Campaign && confirmed_created(s));
        if !campaign_ok {
            let detail = slots
                .iter()
                .find(|s| s.kind == EntityKind::Campaign)
                .and_then(|s| s.last_error.as_ref())
                .map_or_else(
                    || "campaign was not created".to_string(),
                    |e| format!("campaign not created: {}", e.message),
                );
            return Decision::Rollback { reason: detail };
        }

        let missing: Vec<MissingEntity> = slots
            .iter()
            .filter(|s| s.kind != EntityKind::Campaign && !confirmed_created(s))
            .map(|s| MissingEntity {
                slot_id: s.id,
                kind: s.kind,
                index: s.index,
                reason: s.last_error.as_ref().map_or_else(
                    || "never attempted: parent was not created".to_string(),
                    |e| e.message.clone(),
                ),
            })
            .collect();

        if missing.is_empty() {
            Decision::Accept
        } else if job.all_or_nothing {
            Decision::Rollback {
                reason: format!(
                    "{} of {} requested entities missing on an all-or-nothing job",
                    missing.len(),
                    job.requested.total()
                ),
            }
        } else {
            Decision::AcceptPartial { missing }
        }
    }

    /// Delete every created entity of the job, children before parents
    ///
    /// Each successful delete moves its slot to `rolled_back`. Failures
    /// are logged, recorded as residuals on the job's failure reasons,
    /// and do not stop the remaining deletions.
    pub async fn execute(&self, job_id: JobId) -> Result<RollbackReport, EngineError> {
        let mut slots = self.store.slots(job_id).await?;
        // Reverse dependency order: ads, then ad sets, then campaign.
        slots.sort_by_key(|s| std::cmp::Reverse(s.kind.depth()));

        let mut report = RollbackReport::default();
        for slot in slots.into_iter().filter(|s| s.status == SlotStatus::Created) {
            let Some(external_id) = slot.external_id.clone() else {
                continue;
            };
            match self.api.delete(slot.kind, &external_id).await {
                Ok(()) => {
                    self.store
                        .transition_slot(
                            slot.id,
                            SlotStatus::Created,
                            SlotStatus::RolledBack,
                            None,
                            None,
                        )
                        .await?;
                    tracing::info!(
                        job_id = %job_id,
                        slot_id = %slot.id,
                        kind = %slot.kind,
                        external_id = %external_id,
                        "entity rolled back"
                    );
                    report.rolled_back.push(slot.id);
                }
                Err(err) => {
                    tracing::error!(
                        job_id = %job_id,
                        slot_id = %slot.id,
                        kind = %slot.kind,
                        external_id = %external_id,
                        error = %err,
                        "compensating delete failed"
                    );
                    // The residual is durable slot state, not just a log
                    // line; the status report rebuilds it from here.
                    self.store
                        .record_slot_error(
                            slot.id,
                            SlotError::new(SlotErrorKind::RollbackFailed, err.to_string()),
                        )
                        .await?;
                    self.store
                        .add_failure_reason(
                            job_id,
                            format!(
                                "residual {} {external_id}: delete failed: {err}",
                                slot.kind
                            ),
                        )
                        .await?;
                    report.residuals.push(ResidualEntity {
                        slot_id: slot.id,
                        kind: slot.kind,
                        external_id,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

/// True when the slot's recorded failure is a verification discrepancy
#[must_use]
pub fn is_discrepant(slot: &Slot) -> bool {
    matches!(
        slot.last_error.as_ref().map(|e| e.kind),
        Some(SlotErrorKind::VerificationDiscrepancy)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlift_model::{
        AccountRef, ExternalId, IdempotencyKey, RequestedCounts, SlotError,
    };
    use adlift_store::MemoryJobStore;
    use std::collections::BTreeMap;

    struct NoopApi;

    #[async_trait::async_trait]
    impl EntityCreationApi for NoopApi {
        async fn create(
            &self,
            _kind: EntityKind,
            _parent: Option<&ExternalId>,
            _spec: &serde_json::Value,
        ) -> Result<ExternalId, crate::remote::RemoteError> {
            unreachable!("evaluate tests never create")
        }

        async fn delete(
            &self,
            _kind: EntityKind,
            _id: &ExternalId,
        ) -> Result<(), crate::remote::RemoteError> {
            Ok(())
        }

        async fn exists(
            &self,
            _kind: EntityKind,
            _id: &ExternalId,
            _parent: Option<&ExternalId>,
        ) -> Result<bool, crate::remote::RemoteError> {
            Ok(true)
        }
    }

    fn coordinator() -> RollbackCoordinator {
        RollbackCoordinator::new(Arc::new(MemoryJobStore::new()), Arc::new(NoopApi))
    }

    fn job(all_or_nothing: bool) -> Job {
        Job::new(
            JobId::new(),
            IdempotencyKey::new("k"),
            AccountRef::new("act"),
            RequestedCounts {
                campaigns: 1,
                ad_sets: 2,
                ads_per_ad_set: BTreeMap::new(),
            },
            all_or_nothing,
            5,
        )
    }

    fn slot(job_id: JobId, kind: EntityKind, index: usize, status: SlotStatus) -> Slot {
        let mut s = Slot::new(job_id, kind, None, index, serde_json::json!({}));
        if status != SlotStatus::Pending {
            s.transition(SlotStatus::Creating, None, None).unwrap();
        }
        match status {
            SlotStatus::Created => {
                s.transition(
                    SlotStatus::Created,
                    Some(ExternalId::new(format!("ext_{index}"))),
                    None,
                )
                .unwrap();
            }
            SlotStatus::FailedPermanent => {
                s.transition(
                    SlotStatus::FailedPermanent,
                    None,
                    Some(SlotError::new(SlotErrorKind::Validation, "rejected")),
                )
                .unwrap();
            }
            _ => {}
        }
        s
    }

    fn verification(job_id: JobId, slots: &[Slot], discrepancies: Vec<SlotId>) -> VerificationResult {
        let created = slots
            .iter()
            .filter(|s| s.status == SlotStatus::Created)
            .count();
        VerificationResult {
            job_id,
            expected_count: slots.len(),
            confirmed_count: created - discrepancies.len(),
            discrepancies,
        }
    }

    #[test]
    fn all_confirmed_accepts() {
        let j = job(false);
        let slots = vec![
            slot(j.id, EntityKind::Campaign, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 1, SlotStatus::Created),
        ];
        let v = verification(j.id, &slots, vec![]);
        assert_eq!(coordinator().evaluate(&j, &slots, &v), Decision::Accept);
    }

    #[test]
    fn failed_campaign_forces_rollback() {
        let j = job(false);
        let slots = vec![
            slot(j.id, EntityKind::Campaign, 0, SlotStatus::FailedPermanent),
            slot(j.id, EntityKind::AdSet, 0, SlotStatus::Pending),
        ];
        let v = verification(j.id, &slots, vec![]);
        match coordinator().evaluate(&j, &slots, &v) {
            Decision::Rollback { reason } => assert!(reason.contains("rejected")),
            other => panic!("expected rollback, got {other:?}"),
        }
    }

    #[test]
    fn discrepant_campaign_forces_rollback() {
        let j = job(false);
        let slots = vec![slot(j.id, EntityKind::Campaign, 0, SlotStatus::Created)];
        let v = verification(j.id, &slots, vec![slots[0].id]);
        assert!(matches!(
            coordinator().evaluate(&j, &slots, &v),
            Decision::Rollback { .. }
        ));
    }

    #[test]
    fn missing_child_is_partial_acceptance() {
        let j = job(false);
        let slots = vec![
            slot(j.id, EntityKind::Campaign, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 1, SlotStatus::FailedPermanent),
        ];
        let v = verification(j.id, &slots, vec![]);
        match coordinator().evaluate(&j, &slots, &v) {
            Decision::AcceptPartial { missing } => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].kind, EntityKind::AdSet);
                assert_eq!(missing[0].index, 1);
            }
            other => panic!("expected partial acceptance, got {other:?}"),
        }
    }

    #[test]
    fn all_or_nothing_turns_partial_into_rollback() {
        let j = job(true);
        let slots = vec![
            slot(j.id, EntityKind::Campaign, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 0, SlotStatus::FailedPermanent),
        ];
        let v = verification(j.id, &slots, vec![]);
        assert!(matches!(
            coordinator().evaluate(&j, &slots, &v),
            Decision::Rollback { .. }
        ));
    }

    #[test]
    fn stranded_pending_child_counts_as_missing() {
        let j = job(false);
        let slots = vec![
            slot(j.id, EntityKind::Campaign, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 0, SlotStatus::Created),
            slot(j.id, EntityKind::Ad, 0, SlotStatus::Pending),
        ];
        let v = verification(j.id, &slots, vec![]);
        match coordinator().evaluate(&j, &slots, &v) {
            Decision::AcceptPartial { missing } => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].reason.contains("never attempted"));
            }
            other => panic!("expected partial acceptance, got {other:?}"),
        }
    }

    #[test]
    fn discrepant_child_is_missing_not_rollback() {
        let j = job(false);
        let slots = vec![
            slot(j.id, EntityKind::Campaign, 0, SlotStatus::Created),
            slot(j.id, EntityKind::AdSet, 0, SlotStatus::Created),
        ];
        let v = verification(j.id, &slots, vec![slots[1].id]);
        match coordinator().evaluate(&j, &slots, &v) {
            Decision::AcceptPartial { missing } => assert_eq!(missing[0].slot_id, slots[1].id),
            other => panic!("expected partial acceptance, got {other:?}"),
        }
    }
}
