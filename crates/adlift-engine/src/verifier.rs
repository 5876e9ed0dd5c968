//! Post-creation verification
//!
//! A create call returning success is not proof the entity survived:
//! the platform may asynchronously reject or remove it afterward. Once
//! every slot is attempt-terminal, the verifier re-queries each claimed
//! `created` entity under its expected parent and reports the ones that
//! cannot be confirmed.

use crate::error::EngineError;
use crate::remote::EntityCreationApi;
use adlift_model::{JobId, SlotError, SlotErrorKind, SlotStatus, VerificationResult};
use adlift_store::JobStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Remote existence re-checker
pub struct Verifier {
    store: Arc<dyn JobStore>,
    api: Arc<dyn EntityCreationApi>,
}

impl Verifier {
    /// Create a verifier over the given store and remote API
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, api: Arc<dyn EntityCreationApi>) -> Self {
        Self { store, api }
    }

    /// Re-check every `created` slot of the job
    ///
    /// A discrepant slot keeps its `created` status (only rollback may
    /// move it) but gets the discrepancy recorded on `last_error`, and
    /// its id is returned for the rollback decision. An `exists` call
    /// that itself fails is treated as unconfirmed: claiming success on
    /// an unverifiable entity is the one mistake this pass exists to
    /// prevent.
    pub async fn verify(&self, job_id: JobId) -> Result<VerificationResult, EngineError> {
        let slots = self.store.slots(job_id).await?;
        let external_by_slot: HashMap<_, _> = slots
            .iter()
            .filter_map(|s| s.external_id.clone().map(|e| (s.id, e)))
            .collect();

        let expected_count = slots.len();
        let mut confirmed_count = 0;
        let mut discrepancies = Vec::new();

        for slot in slots.iter().filter(|s| s.status == SlotStatus::Created) {
            // A created slot always carries its external id.
            let Some(external_id) = slot.external_id.as_ref() else {
                continue;
            };
            let parent_external = slot.parent.and_then(|p| external_by_slot.get(&p));

            let confirmed = match self
                .api
                .exists(slot.kind, external_id, parent_external)
                .await
            {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(
                        job_id = %job_id,
                        slot_id = %slot.id,
                        error = %err,
                        "existence re-check failed"
                    );
                    false
                }
            };

            if confirmed {
                confirmed_count += 1;
            } else {
                tracing::warn!(
                    job_id = %job_id,
                    slot_id = %slot.id,
                    kind = %slot.kind,
                    external_id = %external_id,
                    "created entity not confirmed remotely"
                );
                self.store
                    .record_slot_error(
                        slot.id,
                        SlotError::new(
                            SlotErrorKind::VerificationDiscrepancy,
                            format!("{} {external_id} not found under expected parent", slot.kind),
                        ),
                    )
                    .await?;
                discrepancies.push(slot.id);
            }
        }

        tracing::info!(
            job_id = %job_id,
            expected = expected_count,
            confirmed = confirmed_count,
            discrepancies = discrepancies.len(),
            "verification complete"
        );
        Ok(VerificationResult {
            job_id,
            expected_count,
            confirmed_count,
            discrepancies,
        })
    }
}
