//! Top-level job orchestration
//!
//! Owns the phase components and drives one job at a time through
//! `pending → verifying_eligibility → in_progress → verifying_result →
//! terminal`. Submission and driving are separate: `submit_job` only
//! creates the durable job (idempotently), `run` takes it to a terminal
//! state, and the caller polls `job_status`. Jobs are independent; any
//! number may run concurrently, each under its own retry budget and
//! worker pool.

use crate::config::EngineConfig;
use crate::creator::Creator;
use crate::eligibility::EligibilityGate;
use crate::error::EngineError;
use crate::remote::{AccountStatusApi, EntityCreationApi};
use crate::report::JobStatusReport;
use crate::retry::RetryPolicy;
use crate::rollback::{Decision, RollbackCoordinator};
use crate::verifier::Verifier;
use adlift_model::{CreationRequest, IdempotencyKey, JobId, JobStatus};
use adlift_store::{JobStore, StoreError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Job state machine driver
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    config: EngineConfig,
    gate: EligibilityGate,
    creator: Creator,
    verifier: Verifier,
    rollback: RollbackCoordinator,
    /// Cooperative cancellation flags for jobs currently being driven
    cancels: DashMap<JobId, Arc<AtomicBool>>,
}

impl Orchestrator {
    /// Wire the engine over a store and the two remote collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        entity_api: Arc<dyn EntityCreationApi>,
        account_api: Arc<dyn AccountStatusApi>,
        config: EngineConfig,
    ) -> Self {
        let policy = RetryPolicy::new(config.backoff_base, config.backoff_cap);
        Self {
            gate: EligibilityGate::new(account_api, &config),
            creator: Creator::new(
                Arc::clone(&store),
                Arc::clone(&entity_api),
                policy,
                config.worker_count,
            ),
            verifier: Verifier::new(Arc::clone(&store), Arc::clone(&entity_api)),
            rollback: RollbackCoordinator::new(Arc::clone(&store), entity_api),
            store,
            config,
            cancels: DashMap::new(),
        }
    }

    /// Create the durable job and its slots; idempotent on the key
    ///
    /// Resubmission with the same key returns the original job id and
    /// creates nothing.
    pub async fn submit_job(
        &self,
        request: CreationRequest,
        key: IdempotencyKey,
    ) -> Result<JobId, EngineError> {
        request.validate()?;
        let budget = request
            .retry_budget
            .unwrap_or(self.config.default_retry_budget);
        let (job, created) = self.store.create_job(&request, &key, budget).await?;
        if created {
            tracing::info!(job_id = %job.id, key = %key, "job submitted");
        }
        Ok(job.id)
    }

    /// Drive the job to a terminal status
    ///
    /// Exactly one runner wins the `pending → verifying_eligibility`
    /// swap; a second concurrent `run` on the same job observes the
    /// conflict and either reports the terminal status or backs off.
    pub async fn run(&self, job_id: JobId) -> Result<JobStatus, EngineError> {
        match self
            .store
            .transition_job(job_id, JobStatus::Pending, JobStatus::VerifyingEligibility)
            .await
        {
            Ok(_) => {}
            Err(StoreError::JobConflict { actual, .. }) => {
                if actual.is_terminal() {
                    return Ok(actual);
                }
                return Err(EngineError::AlreadyRunning);
            }
            Err(err) => return Err(err.into()),
        }

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancels.insert(job_id, Arc::clone(&cancel));
        let result = self.drive(job_id, cancel).await;
        self.cancels.remove(&job_id);
        result
    }

    async fn drive(
        &self,
        job_id: JobId,
        cancel: Arc<AtomicBool>,
    ) -> Result<JobStatus, EngineError> {
        let job = self.store.job(job_id).await?;

        // Phase 1: pre-flight, zero side effects on refusal.
        let eligibility = self.gate.check(&job.account, job.requested.total()).await;
        if !eligibility.pass {
            for reason in eligibility.reasons {
                self.store.add_failure_reason(job_id, reason).await?;
            }
            self.store
                .transition_job(job_id, JobStatus::VerifyingEligibility, JobStatus::Failed)
                .await?;
            return Ok(JobStatus::Failed);
        }
        self.store
            .transition_job(job_id, JobStatus::VerifyingEligibility, JobStatus::InProgress)
            .await?;

        // Phase 2: creation under the worker pool.
        self.creator.run(job_id, Arc::clone(&cancel)).await?;

        if cancel.load(Ordering::SeqCst) {
            self.store
                .add_failure_reason(job_id, "cancelled".to_string())
                .await?;
            self.store
                .transition_job(job_id, JobStatus::InProgress, JobStatus::Failed)
                .await?;
            // Compensate whatever was created before the flag landed.
            let report = self.rollback.execute(job_id).await?;
            if report.rolled_back.is_empty() && report.residuals.is_empty() {
                return Ok(JobStatus::Failed);
            }
            self.store
                .transition_job(job_id, JobStatus::Failed, JobStatus::RolledBack)
                .await?;
            return Ok(JobStatus::RolledBack);
        }

        self.store
            .transition_job(job_id, JobStatus::InProgress, JobStatus::VerifyingResult)
            .await?;

        // Phase 3: remote existence re-check.
        let verification = self.verifier.verify(job_id).await?;

        // Phase 4: accept, accept partially, or compensate.
        let job = self.store.job(job_id).await?;
        let slots = self.store.slots(job_id).await?;
        match self.rollback.evaluate(&job, &slots, &verification) {
            Decision::Accept => {
                self.store
                    .transition_job(job_id, JobStatus::VerifyingResult, JobStatus::Completed)
                    .await?;
                tracing::info!(job_id = %job_id, "job completed");
                Ok(JobStatus::Completed)
            }
            Decision::AcceptPartial { missing } => {
                tracing::warn!(
                    job_id = %job_id,
                    missing = missing.len(),
                    "job completed partially"
                );
                self.store
                    .transition_job(
                        job_id,
                        JobStatus::VerifyingResult,
                        JobStatus::CompletedPartial,
                    )
                    .await?;
                Ok(JobStatus::CompletedPartial)
            }
            Decision::Rollback { reason } => {
                tracing::warn!(job_id = %job_id, %reason, "rolling job back");
                self.store.add_failure_reason(job_id, reason).await?;
                let rollback = self.rollback.execute(job_id).await?;
                if !rollback.residuals.is_empty() {
                    tracing::warn!(
                        job_id = %job_id,
                        residuals = rollback.residuals.len(),
                        "rollback left residual entities"
                    );
                }
                self.store
                    .transition_job(job_id, JobStatus::VerifyingResult, JobStatus::RolledBack)
                    .await?;
                Ok(JobStatus::RolledBack)
            }
        }
    }

    /// Request cooperative cancellation of a running job
    ///
    /// In-flight remote calls finish; nothing new is dequeued once the
    /// flag is observed. Returns false when the job is not currently
    /// being driven.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.cancels.get(&job_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                tracing::info!(job_id = %job_id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Snapshot the job for the polling caller
    pub async fn job_status(&self, job_id: JobId) -> Result<JobStatusReport, EngineError> {
        let job = self.store.job(job_id).await?;
        let slots = self.store.slots(job_id).await?;
        Ok(JobStatusReport::build(&job, &slots))
    }
}
