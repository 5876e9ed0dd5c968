//! End-to-end job scenarios against scripted remote mocks

use adlift_engine::{EngineConfig, Orchestrator, RemoteError};
use adlift_model::{
    AccountRef, AdSetRequest, CreationRequest, EntityKind, IdempotencyKey, JobStatus,
    SlotErrorKind, SlotStatus,
};
use adlift_store::{JobStore, MemoryJobStore};
use adlift_test_utils::{MockAccountApi, MockEntityApi};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<MemoryJobStore>,
    entity_api: Arc<MockEntityApi>,
}

fn harness(config: EngineConfig) -> Harness {
    adlift_engine::telemetry::init();
    let store = Arc::new(MemoryJobStore::new());
    let entity_api = Arc::new(MockEntityApi::new());
    let account_api = Arc::new(MockAccountApi::healthy());
    let orchestrator = Orchestrator::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&entity_api) as _,
        account_api as _,
        config,
    );
    Harness {
        orchestrator,
        store,
        entity_api,
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig::new().with_backoff(Duration::from_millis(1), Duration::from_millis(10))
}

/// 1 campaign + `ad_sets` ad sets + `ads_each` ads per set, tagged for scripting
fn request(ad_sets: usize, ads_each: usize) -> CreationRequest {
    let mut req = CreationRequest::new(AccountRef::new("act_1"), json!({"tag": "campaign"}));
    for i in 0..ad_sets {
        let ads = (0..ads_each)
            .map(|j| json!({"tag": format!("ad-{i}-{j}")}))
            .collect();
        req = req.with_ad_set(AdSetRequest::new(json!({"tag": format!("ad_set-{i}")}), ads));
    }
    req
}

#[tokio::test]
async fn all_success_first_try() {
    let h = harness(fast_config());
    let job_id = h
        .orchestrator
        .submit_job(request(3, 1), IdempotencyKey::new("s1"))
        .await
        .unwrap();
    let status = h.orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let job = h.store.job(job_id).await.unwrap();
    assert_eq!(job.retries_used, 0);

    let slots = h.store.slots(job_id).await.unwrap();
    assert_eq!(slots.len(), 7);
    assert!(slots.iter().all(|s| s.status == SlotStatus::Created));
    assert_eq!(h.entity_api.entity_count(), 7);

    let report = h.orchestrator.job_status(job_id).await.unwrap();
    assert_eq!(report.slots_created, 7);
    assert_eq!(report.slots_failed, 0);
    assert_eq!(report.slots_pending, 0);
    assert!(report.discrepancies.is_empty());
    assert!(report.residuals.is_empty());
    assert_eq!(report.per_kind[&EntityKind::Campaign].created, 1);
    assert_eq!(report.per_kind[&EntityKind::AdSet].created, 3);
    assert_eq!(report.per_kind[&EntityKind::Ad].created, 3);
}

#[tokio::test]
async fn rate_limited_twice_then_succeeds() {
    let h = harness(fast_config());
    h.entity_api.fail_create(
        "ad_set-1",
        vec![
            RemoteError::rate_limited("429").with_retry_after(Duration::from_millis(2)),
            RemoteError::rate_limited("429"),
        ],
    );

    let job_id = h
        .orchestrator
        .submit_job(request(3, 1), IdempotencyKey::new("s2"))
        .await
        .unwrap();
    let status = h.orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let job = h.store.job(job_id).await.unwrap();
    assert_eq!(job.retries_used, 2);

    let slots = h.store.slots(job_id).await.unwrap();
    let stubborn = slots
        .iter()
        .find(|s| s.kind == EntityKind::AdSet && s.index == 1)
        .unwrap();
    assert_eq!(stubborn.attempt_count, 3);
    assert_eq!(stubborn.status, SlotStatus::Created);
}

#[tokio::test]
async fn permanent_campaign_failure_rolls_back_with_zero_child_attempts() {
    let h = harness(fast_config());
    h.entity_api.fail_create(
        "campaign",
        vec![RemoteError::validation("daily budget below minimum")],
    );

    let job_id = h
        .orchestrator
        .submit_job(request(3, 1), IdempotencyKey::new("s3"))
        .await
        .unwrap();
    let status = h.orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::RolledBack);

    // Exactly one remote call was ever made.
    assert_eq!(h.entity_api.create_calls(), 1);
    assert_eq!(h.entity_api.entity_count(), 0);

    let slots = h.store.slots(job_id).await.unwrap();
    for slot in slots.iter().filter(|s| s.kind != EntityKind::Campaign) {
        assert_eq!(slot.status, SlotStatus::Pending);
        assert_eq!(slot.attempt_count, 0);
    }

    let report = h.orchestrator.job_status(job_id).await.unwrap();
    assert!(report
        .failure_reasons
        .iter()
        .any(|r| r.contains("daily budget below minimum")));
}

#[tokio::test]
async fn one_permanent_ad_set_failure_completes_partially() {
    let h = harness(fast_config());
    h.entity_api
        .fail_create("ad_set-17", vec![RemoteError::validation("bad audience")]);

    let job_id = h
        .orchestrator
        .submit_job(request(49, 0), IdempotencyKey::new("s4"))
        .await
        .unwrap();
    let status = h.orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::CompletedPartial);

    let report = h.orchestrator.job_status(job_id).await.unwrap();
    // Campaign + 48 ad sets.
    assert_eq!(report.slots_created, 49);
    assert_eq!(report.slots_failed, 1);
    assert_eq!(report.per_kind[&EntityKind::AdSet].created, 48);
    assert_eq!(report.per_kind[&EntityKind::AdSet].failed, 1);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].kind, EntityKind::AdSet);
    assert_eq!(report.missing[0].index, 17);
    assert!(report.missing[0].reason.contains("bad audience"));
}

#[tokio::test]
async fn vanished_entity_is_reported_as_discrepancy() {
    let h = harness(fast_config());
    h.entity_api.vanish_after_create("ad_set-4");

    let job_id = h
        .orchestrator
        .submit_job(request(5, 0), IdempotencyKey::new("s5"))
        .await
        .unwrap();
    let status = h.orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::CompletedPartial);

    let slots = h.store.slots(job_id).await.unwrap();
    let vanished = slots
        .iter()
        .find(|s| s.kind == EntityKind::AdSet && s.index == 4)
        .unwrap();
    // Creator legitimately marked it created; verification amended it.
    assert_eq!(vanished.status, SlotStatus::Created);
    assert_eq!(
        vanished.last_error.as_ref().unwrap().kind,
        SlotErrorKind::VerificationDiscrepancy
    );

    let report = h.orchestrator.job_status(job_id).await.unwrap();
    assert_eq!(report.discrepancies, vec![vanished.id]);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].slot_id, vanished.id);
}

#[tokio::test]
async fn all_or_nothing_rolls_back_everything_created() {
    let h = harness(fast_config());
    h.entity_api
        .fail_create("ad_set-2", vec![RemoteError::validation("rejected")]);

    let job_id = h
        .orchestrator
        .submit_job(
            request(3, 1).all_or_nothing(),
            IdempotencyKey::new("s6"),
        )
        .await
        .unwrap();
    let status = h.orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::RolledBack);

    // Campaign, ad sets 0 and 1, and their ads were created, then deleted.
    assert_eq!(h.entity_api.entity_count(), 0);

    let report = h.orchestrator.job_status(job_id).await.unwrap();
    assert_eq!(report.slots_rolled_back, 5);
    assert_eq!(report.slots_failed, 1);
    // The failed ad set's ad was never attempted.
    assert_eq!(report.slots_pending, 1);
    assert_eq!(report.slots_created, 0);
}

#[tokio::test]
async fn ineligible_account_fails_with_zero_remote_calls() {
    let store = Arc::new(MemoryJobStore::new());
    let entity_api = Arc::new(MockEntityApi::new());
    let account_api = Arc::new(MockAccountApi::healthy());
    account_api.set_status(adlift_engine::AccountStatus {
        active: false,
        has_payment_method: true,
        age_days: 365,
        quota_remaining: 10_000,
    });
    let orchestrator = Orchestrator::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&entity_api) as _,
        account_api as _,
        fast_config(),
    );

    let job_id = orchestrator
        .submit_job(request(3, 1), IdempotencyKey::new("s7"))
        .await
        .unwrap();
    let status = orchestrator.run(job_id).await.unwrap();
    assert_eq!(status, JobStatus::Failed);
    assert_eq!(entity_api.create_calls(), 0);

    let report = orchestrator.job_status(job_id).await.unwrap();
    assert!(report
        .failure_reasons
        .iter()
        .any(|r| r.contains("not active")));
    assert_eq!(report.slots_created, 0);
}
