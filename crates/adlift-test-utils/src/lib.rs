//! Testing utilities for the adlift workspace
//!
//! Scripted in-memory stand-ins for the two remote collaborators.
//! Failure scripts are keyed by a `"tag"` field tests embed in entity
//! specs, so a test can make exactly ad set #2 rate-limited twice, or
//! make one entity vanish after creation.

#![allow(missing_docs)]

use adlift_engine::remote::{
    AccountStatus, AccountStatusApi, EntityCreationApi, RemoteError,
};
use adlift_model::{AccountRef, EntityKind, ExternalId};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// One remotely "created" entity
#[derive(Debug, Clone)]
pub struct CreatedEntity {
    pub kind: EntityKind,
    pub parent: Option<ExternalId>,
    pub tag: String,
}

/// Scripted mock of the entity create/delete/exists API
#[derive(Debug, Default)]
pub struct MockEntityApi {
    /// Registered entities by external id
    entities: DashMap<ExternalId, CreatedEntity>,
    /// Pending create failures per tag, consumed one per call
    create_failures: DashMap<String, VecDeque<RemoteError>>,
    /// Tags whose entities disappear right after a successful create
    vanishing: DashSet<String>,
    /// Tags whose entities refuse deletion
    delete_failures: DashMap<String, RemoteError>,
    /// Simulated remote latency, to make concurrency observable
    latency: Mutex<Duration>,
    create_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockEntityApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue create failures for the given tag, consumed in order
    pub fn fail_create(&self, tag: &str, errors: Vec<RemoteError>) {
        self.create_failures
            .entry(tag.to_string())
            .or_default()
            .extend(errors);
    }

    /// Make the tagged entity vanish right after a successful create
    pub fn vanish_after_create(&self, tag: &str) {
        self.vanishing.insert(tag.to_string());
    }

    /// Make deletes of the tagged entity fail
    pub fn fail_delete(&self, tag: &str, error: RemoteError) {
        self.delete_failures.insert(tag.to_string(), error);
    }

    /// Simulate remote latency on create calls
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Entities currently registered remotely
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_registered(&self, id: &ExternalId) -> bool {
        self.entities.contains_key(id)
    }

    /// Total create calls observed, including failed ones
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently in-flight create calls observed
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn tag_of(spec: &serde_json::Value) -> String {
        spec.get("tag")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait::async_trait]
impl EntityCreationApi for MockEntityApi {
    async fn create(
        &self,
        kind: EntityKind,
        parent: Option<&ExternalId>,
        spec: &serde_json::Value,
    ) -> Result<ExternalId, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let tag = Self::tag_of(spec);
        let scripted = self
            .create_failures
            .get_mut(&tag)
            .and_then(|mut q| q.pop_front());

        let result = match scripted {
            Some(err) => Err(err),
            None => {
                let id = ExternalId::new(format!("{kind}_{}", Uuid::new_v4().simple()));
                if !self.vanishing.contains(&tag) {
                    self.entities.insert(
                        id.clone(),
                        CreatedEntity {
                            kind,
                            parent: parent.cloned(),
                            tag,
                        },
                    );
                }
                Ok(id)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, _kind: EntityKind, id: &ExternalId) -> Result<(), RemoteError> {
        if let Some(entity) = self.entities.get(id) {
            if let Some(err) = self.delete_failures.get(&entity.tag) {
                return Err(err.clone());
            }
        }
        self.entities.remove(id);
        Ok(())
    }

    async fn exists(
        &self,
        kind: EntityKind,
        id: &ExternalId,
        parent: Option<&ExternalId>,
    ) -> Result<bool, RemoteError> {
        Ok(self
            .entities
            .get(id)
            .map(|e| e.kind == kind && e.parent.as_ref() == parent)
            .unwrap_or(false))
    }
}

/// Mock of the read-only account standing API
#[derive(Debug)]
pub struct MockAccountApi {
    status: Mutex<AccountStatus>,
    next_error: Mutex<Option<RemoteError>>,
}

impl MockAccountApi {
    /// Healthy account: active, paid, aged, generous quota
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: Mutex::new(AccountStatus {
                active: true,
                has_payment_method: true,
                age_days: 365,
                quota_remaining: 10_000,
            }),
            next_error: Mutex::new(None),
        }
    }

    pub fn set_status(&self, status: AccountStatus) {
        *self.status.lock() = status;
    }

    /// Fail the next status call
    pub fn fail_next(&self, error: RemoteError) {
        *self.next_error.lock() = Some(error);
    }
}

impl Default for MockAccountApi {
    fn default() -> Self {
        Self::healthy()
    }
}

#[async_trait::async_trait]
impl AccountStatusApi for MockAccountApi {
    async fn status(&self, _account: &AccountRef) -> Result<AccountStatus, RemoteError> {
        if let Some(err) = self.next_error.lock().take() {
            return Err(err);
        }
        Ok(*self.status.lock())
    }
}
