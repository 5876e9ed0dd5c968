//! In-memory job store
//!
//! DashMap-backed implementation of [`JobStore`]. Row-level locking
//! comes from the map's shard entry guards; the compare-and-set check
//! and the mutation happen under the same guard, so no transition can
//! interleave with another on the same row.

use crate::{JobStore, StoreError};
use adlift_model::{
    CreationRequest, EntityKind, ExternalId, IdempotencyKey, Job, JobId, JobStatus, Slot,
    SlotError, SlotId, SlotStatus,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory [`JobStore`]
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<JobId, Job>,
    slots: DashMap<SlotId, Slot>,
    /// Slot ids per job, in creation order
    job_slots: DashMap<JobId, Vec<SlotId>>,
    /// Idempotency key -> winning job
    by_key: DashMap<IdempotencyKey, JobId>,
}

impl MemoryJobStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a request into pending slots with parent links wired
    fn build_slots(job_id: JobId, request: &CreationRequest) -> Vec<Slot> {
        let mut slots = Vec::with_capacity(request.requested_counts().total());
        let campaign = Slot::new(
            job_id,
            EntityKind::Campaign,
            None,
            0,
            request.campaign_spec.clone(),
        );
        let campaign_id = campaign.id;
        slots.push(campaign);

        for (set_index, ad_set) in request.ad_sets.iter().enumerate() {
            let set_slot = Slot::new(
                job_id,
                EntityKind::AdSet,
                Some(campaign_id),
                set_index,
                ad_set.spec.clone(),
            );
            let set_id = set_slot.id;
            slots.push(set_slot);
            for (ad_index, ad_spec) in ad_set.ads.iter().enumerate() {
                slots.push(Slot::new(
                    job_id,
                    EntityKind::Ad,
                    Some(set_id),
                    ad_index,
                    ad_spec.clone(),
                ));
            }
        }
        slots
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(
        &self,
        request: &CreationRequest,
        key: &IdempotencyKey,
        retry_budget: u32,
    ) -> Result<(Job, bool), StoreError> {
        // The entry guard on the key index is the arbiter for concurrent
        // resubmissions: exactly one caller builds the job and slots.
        match self.by_key.entry(key.clone()) {
            Entry::Occupied(existing) => {
                let job_id = *existing.get();
                let job = self
                    .jobs
                    .get(&job_id)
                    .map(|j| j.clone())
                    .ok_or(StoreError::JobNotFound(job_id))?;
                tracing::debug!(job_id = %job_id, key = %key, "idempotent resubmission");
                Ok((job, false))
            }
            Entry::Vacant(vacant) => {
                let job_id = JobId::new();
                let job = Job::new(
                    job_id,
                    key.clone(),
                    request.account.clone(),
                    request.requested_counts(),
                    request.all_or_nothing,
                    retry_budget,
                );
                let slots = Self::build_slots(job_id, request);
                let slot_ids: Vec<SlotId> = slots.iter().map(|s| s.id).collect();
                for slot in slots {
                    self.slots.insert(slot.id, slot);
                }
                self.job_slots.insert(job_id, slot_ids);
                self.jobs.insert(job_id, job.clone());
                vacant.insert(job_id);
                tracing::info!(
                    job_id = %job_id,
                    slots = job.requested.total(),
                    "job created"
                );
                Ok((job, true))
            }
        }
    }

    async fn job(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs
            .get(&id)
            .map(|j| j.clone())
            .ok_or(StoreError::JobNotFound(id))
    }

    async fn slots(&self, job_id: JobId) -> Result<Vec<Slot>, StoreError> {
        let ids = self
            .job_slots
            .get(&job_id)
            .map(|v| v.clone())
            .ok_or(StoreError::JobNotFound(job_id))?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let slot = self
                .slots
                .get(&id)
                .map(|s| s.clone())
                .ok_or(StoreError::SlotNotFound(id))?;
            out.push(slot);
        }
        Ok(out)
    }

    async fn slot(&self, id: SlotId) -> Result<Slot, StoreError> {
        self.slots
            .get(&id)
            .map(|s| s.clone())
            .ok_or(StoreError::SlotNotFound(id))
    }

    async fn transition_slot(
        &self,
        id: SlotId,
        from: SlotStatus,
        to: SlotStatus,
        external_id: Option<ExternalId>,
        error: Option<SlotError>,
    ) -> Result<Slot, StoreError> {
        let mut slot = self.slots.get_mut(&id).ok_or(StoreError::SlotNotFound(id))?;
        if slot.status != from {
            return Err(StoreError::SlotConflict {
                expected: from,
                actual: slot.status,
            });
        }
        slot.transition(to, external_id, error)?;
        tracing::debug!(slot_id = %id, ?from, ?to, "slot transition");
        Ok(slot.clone())
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, StoreError> {
        let mut job = self.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        if job.status != from {
            return Err(StoreError::JobConflict {
                expected: from,
                actual: job.status,
            });
        }
        job.transition(to)?;
        tracing::info!(job_id = %id, ?from, ?to, "job transition");
        Ok(job.clone())
    }

    async fn try_consume_retry(&self, id: JobId) -> Result<bool, StoreError> {
        let mut job = self.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        if job.retries_used >= job.retry_budget {
            return Ok(false);
        }
        job.retries_used += 1;
        Ok(true)
    }

    async fn add_failure_reason(&self, id: JobId, reason: String) -> Result<(), StoreError> {
        let mut job = self.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        job.failure_reasons.push(reason);
        Ok(())
    }

    async fn record_slot_error(&self, id: SlotId, error: SlotError) -> Result<(), StoreError> {
        let mut slot = self.slots.get_mut(&id).ok_or(StoreError::SlotNotFound(id))?;
        slot.last_error = Some(error);
        Ok(())
    }
}
