//! Creator worker pool
//!
//! A fixed-size set of workers drains a per-job queue of ready slots and
//! calls the remote creation API, one slot per worker at a time. The
//! pool size is what bounds concurrent remote calls.
//!
//! Parent ordering is structural, not timed: a slot enters the queue
//! only when its parent slot lands `created` (the campaign slot seeds
//! the queue). A slot whose parent fails permanently is never enqueued
//! and stays `pending` for the life of the job.

use crate::error::EngineError;
use crate::remote::EntityCreationApi;
use crate::retry::{FailureClass, RetryPolicy};
use adlift_model::{JobId, Slot, SlotError, SlotErrorKind, SlotId, SlotStatus};
use adlift_store::{JobStore, StoreError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;

/// Idle workers re-check the queue at this interval as a backstop
/// against a missed wakeup.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Bounded-concurrency slot creation
#[derive(Clone)]
pub struct Creator {
    store: Arc<dyn JobStore>,
    api: Arc<dyn EntityCreationApi>,
    policy: RetryPolicy,
    worker_count: usize,
}

/// Shared queue state for one job run
struct PoolState {
    queue: parking_lot::Mutex<VecDeque<SlotId>>,
    /// Slots popped but not yet finished; while nonzero, new work may
    /// still be enqueued (a finishing parent pushes its children)
    in_flight: AtomicUsize,
    notify: Notify,
    /// Children by parent slot, precomputed from the job's slot set
    children: HashMap<SlotId, Vec<SlotId>>,
}

impl Creator {
    /// Create a creator over the given store and remote API
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        api: Arc<dyn EntityCreationApi>,
        policy: RetryPolicy,
        worker_count: usize,
    ) -> Self {
        Self {
            store,
            api,
            policy,
            worker_count: worker_count.max(1),
        }
    }

    /// Drive every reachable slot of the job to a terminal attempt state
    ///
    /// Returns once the queue is drained and no slot is in flight.
    /// Cancellation is cooperative: in-flight attempts finish, nothing
    /// new is dequeued once the flag is observed.
    pub async fn run(&self, job_id: JobId, cancel: Arc<AtomicBool>) -> Result<(), EngineError> {
        let slots = self.store.slots(job_id).await?;

        let mut children: HashMap<SlotId, Vec<SlotId>> = HashMap::new();
        let mut roots = VecDeque::new();
        for slot in &slots {
            match slot.parent {
                Some(parent) => children.entry(parent).or_default().push(slot.id),
                None => {
                    if slot.status == SlotStatus::Pending {
                        roots.push_back(slot.id);
                    }
                }
            }
        }

        let state = Arc::new(PoolState {
            queue: parking_lot::Mutex::new(roots),
            in_flight: AtomicUsize::new(0),
            notify: Notify::new(),
            children,
        });

        let workers = self.worker_count.min(slots.len().max(1));
        tracing::debug!(job_id = %job_id, workers, slots = slots.len(), "creator pool starting");

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let creator = self.clone();
            let state = Arc::clone(&state);
            let cancel = Arc::clone(&cancel);
            set.spawn(async move { creator.worker_loop(worker, job_id, state, cancel).await });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(job_id = %job_id, error = %err, "creator worker failed");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::error!(job_id = %job_id, error = %join_err, "creator worker panicked");
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn worker_loop(
        &self,
        worker: usize,
        job_id: JobId,
        state: Arc<PoolState>,
        cancel: Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        loop {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!(job_id = %job_id, worker, "cancellation observed, worker exiting");
                return Ok(());
            }

            // in_flight must rise before the queue lock is released, or
            // an idle worker can see an empty queue with zero in flight
            // and exit while this pop is still landing.
            let next = {
                let mut queue = state.queue.lock();
                let slot_id = queue.pop_front();
                if slot_id.is_some() {
                    state.in_flight.fetch_add(1, Ordering::SeqCst);
                }
                slot_id
            };
            let Some(slot_id) = next else {
                if state.in_flight.load(Ordering::SeqCst) == 0 {
                    return Ok(());
                }
                tokio::select! {
                    () = state.notify.notified() => {}
                    () = tokio::time::sleep(IDLE_POLL) => {}
                }
                continue;
            };

            let created = self.process_slot(job_id, slot_id, &cancel).await;
            if let Ok(true) = created {
                if let Some(kids) = state.children.get(&slot_id) {
                    let mut queue = state.queue.lock();
                    queue.extend(kids.iter().copied());
                }
            }
            state.in_flight.fetch_sub(1, Ordering::SeqCst);
            state.notify.notify_waiters();
            created?;
        }
    }

    /// Attempt one slot until it is created, permanently failed, or the
    /// job is cancelled. Returns whether the slot landed `created`.
    async fn process_slot(
        &self,
        job_id: JobId,
        slot_id: SlotId,
        cancel: &AtomicBool,
    ) -> Result<bool, EngineError> {
        let slot = self.store.slot(slot_id).await?;
        let parent_external = match self.parent_external_id(&slot).await? {
            ParentReadiness::Ready(external) => external,
            ParentReadiness::NotCreated => {
                // Enqueue discipline should make this unreachable.
                tracing::warn!(slot_id = %slot_id, "slot dequeued before parent created");
                return Ok(false);
            }
        };

        let mut from = slot.status;
        loop {
            let claimed = match self
                .store
                .transition_slot(slot_id, from, SlotStatus::Creating, None, None)
                .await
            {
                Ok(slot) => slot,
                Err(StoreError::SlotConflict { actual, .. }) => {
                    tracing::warn!(slot_id = %slot_id, ?actual, "lost slot claim race");
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            };

            match self
                .api
                .create(claimed.kind, parent_external.as_ref(), &claimed.spec)
                .await
            {
                Ok(external_id) => {
                    tracing::info!(
                        job_id = %job_id,
                        slot_id = %slot_id,
                        kind = %claimed.kind,
                        external_id = %external_id,
                        attempt = claimed.attempt_count,
                        "entity created"
                    );
                    self.store
                        .transition_slot(
                            slot_id,
                            SlotStatus::Creating,
                            SlotStatus::Created,
                            Some(external_id),
                            None,
                        )
                        .await?;
                    return Ok(true);
                }
                Err(remote) => match self.policy.classify(&remote) {
                    FailureClass::Permanent => {
                        tracing::warn!(
                            job_id = %job_id,
                            slot_id = %slot_id,
                            error = %remote,
                            "permanent failure"
                        );
                        self.store
                            .transition_slot(
                                slot_id,
                                SlotStatus::Creating,
                                SlotStatus::FailedPermanent,
                                None,
                                Some(remote.to_slot_error()),
                            )
                            .await?;
                        return Ok(false);
                    }
                    FailureClass::Transient => {
                        if !self.store.try_consume_retry(job_id).await? {
                            tracing::warn!(
                                job_id = %job_id,
                                slot_id = %slot_id,
                                "retry budget exhausted"
                            );
                            self.store
                                .transition_slot(
                                    slot_id,
                                    SlotStatus::Creating,
                                    SlotStatus::FailedPermanent,
                                    None,
                                    Some(SlotError::new(
                                        SlotErrorKind::RetryBudgetExhausted,
                                        remote.message.clone(),
                                    )),
                                )
                                .await?;
                            return Ok(false);
                        }

                        let waiting = self
                            .store
                            .transition_slot(
                                slot_id,
                                SlotStatus::Creating,
                                SlotStatus::FailedTransient,
                                None,
                                Some(remote.to_slot_error()),
                            )
                            .await?;
                        let delay = self
                            .policy
                            .next_delay(waiting.attempt_count, remote.retry_after);
                        tracing::debug!(
                            job_id = %job_id,
                            slot_id = %slot_id,
                            attempt = waiting.attempt_count,
                            delay_ms = delay.as_millis() as u64,
                            "transient failure, backing off"
                        );
                        tokio::time::sleep(delay).await;

                        if cancel.load(Ordering::SeqCst) {
                            // Leave the slot in failed_transient; the
                            // cancellation path treats it as not created.
                            return Ok(false);
                        }
                        from = SlotStatus::FailedTransient;
                    }
                },
            }
        }
    }

    async fn parent_external_id(&self, slot: &Slot) -> Result<ParentReadiness, EngineError> {
        let Some(parent_id) = slot.parent else {
            return Ok(ParentReadiness::Ready(None));
        };
        let parent = self.store.slot(parent_id).await?;
        if parent.status == SlotStatus::Created {
            Ok(ParentReadiness::Ready(parent.external_id))
        } else {
            Ok(ParentReadiness::NotCreated)
        }
    }
}

enum ParentReadiness {
    Ready(Option<adlift_model::ExternalId>),
    NotCreated,
}
