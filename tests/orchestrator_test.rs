//! Orchestrator behavior against the in-memory status store: claim and
//! retry semantics, idempotent re-runs, and requested-platform scoping.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use stage_social_creator::db::memory::MemoryStatusStore;
use stage_social_creator::db::store::{StatusStore, StoreError};
use stage_social_creator::models::identity::Identity;
use stage_social_creator::models::job::{Job, JobStatus, StepState};
use stage_social_creator::models::platform::Platform;
use stage_social_creator::naming::derive_identity;
use stage_social_creator::services::executor::{StepError, StepExecutor, StepSuccess};
use stage_social_creator::services::orchestrator::{Orchestrator, RetryPolicy};

/// Scripted executor: consumes one result per call and counts invocations.
struct MockExecutor {
    platform: Platform,
    script: Mutex<Vec<Result<StepSuccess, StepError>>>,
    calls: AtomicUsize,
}

impl MockExecutor {
    fn new(platform: Platform, script: Vec<Result<StepSuccess, StepError>>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    fn succeeding(platform: Platform, handle: &str) -> Arc<Self> {
        Self::new(
            platform,
            vec![Ok(StepSuccess {
                handle: handle.to_string(),
                url: format!("https://example.com/{handle}"),
                external_id: None,
            })],
        )
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepExecutor for MockExecutor {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn execute(&self, _identity: &Identity) -> Result<StepSuccess, StepError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            panic!("executor for {} called past its script", self.platform);
        }
        script.remove(0)
    }
}

fn retry_policy(max_attempts: i32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_base: Duration::from_millis(1),
    }
}

async fn make_job(store: &MemoryStatusStore, platforms: &[Platform]) -> Job {
    let identity = derive_identity("Kota", "STAGE").unwrap();
    let requested: BTreeSet<Platform> = platforms.iter().copied().collect();
    store.create_job("Kota", &identity, &requested).await.unwrap()
}

#[tokio::test]
async fn all_requested_steps_succeed() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::succeeding(Platform::Facebook, "StageKota");
    let yt = MockExecutor::succeeding(Platform::Youtube, "StageKota");
    let orchestrator = Orchestrator::new(
        store.clone(),
        vec![fb.clone() as _, yt.clone() as _],
        retry_policy(3),
    );

    let job = make_job(&store, &[Platform::Facebook, Platform::Youtube]).await;
    let status = orchestrator.run_job(job.id).await.unwrap();

    assert_eq!(status, JobStatus::Succeeded);
    assert_eq!(fb.calls(), 1);
    assert_eq!(yt.calls(), 1);

    let job = store.get_job(job.id).await.unwrap();
    let fb_step = job.step(Platform::Facebook).unwrap();
    assert_eq!(fb_step.state, StepState::Succeeded);
    assert_eq!(fb_step.handle.as_deref(), Some("StageKota"));
    assert_eq!(fb_step.attempts, 1);
    // Instagram was never requested and stays untouched.
    let ig_step = job.step(Platform::Instagram).unwrap();
    assert_eq!(ig_step.state, StepState::NotRequested);
    assert_eq!(ig_step.attempts, 0);
}

#[tokio::test]
async fn rerunning_a_finished_job_dispatches_nothing() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::succeeding(Platform::Facebook, "StageKota");
    let orchestrator = Orchestrator::new(store.clone(), vec![fb.clone() as _], retry_policy(3));

    let job = make_job(&store, &[Platform::Facebook]).await;
    orchestrator.run_job(job.id).await.unwrap();
    let first = store.get_job(job.id).await.unwrap();

    // Second pass must not create a second presence or disturb the record.
    let status = orchestrator.run_job(job.id).await.unwrap();
    assert_eq!(status, JobStatus::Succeeded);
    assert_eq!(fb.calls(), 1);

    let second = store.get_job(job.id).await.unwrap();
    let a = first.step(Platform::Facebook).unwrap();
    let b = second.step(Platform::Facebook).unwrap();
    assert_eq!(a.handle, b.handle);
    assert_eq!(a.attempts, b.attempts);
}

#[tokio::test]
async fn retryable_failures_exhaust_attempt_budget() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::new(
        Platform::Facebook,
        vec![
            Err(StepError::External("502 from upstream".to_string())),
            Err(StepError::External("502 from upstream".to_string())),
            Err(StepError::External("502 from upstream".to_string())),
        ],
    );
    let orchestrator = Orchestrator::new(store.clone(), vec![fb.clone() as _], retry_policy(3));

    let job = make_job(&store, &[Platform::Facebook]).await;
    let status = orchestrator.run_job(job.id).await.unwrap();

    assert_eq!(status, JobStatus::Failed);
    assert_eq!(fb.calls(), 3);

    let step = store
        .get_job(job.id)
        .await
        .unwrap()
        .step(Platform::Facebook)
        .cloned()
        .unwrap();
    assert_eq!(step.state, StepState::FailedPermanent);
    assert_eq!(step.attempts, 3);
    assert!(step.error.unwrap().contains("502"));
}

#[tokio::test]
async fn non_retryable_failure_stops_after_one_attempt() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::new(
        Platform::Facebook,
        vec![Err(StepError::HandleUnavailable("StageKota".to_string()))],
    );
    let orchestrator = Orchestrator::new(store.clone(), vec![fb.clone() as _], retry_policy(3));

    let job = make_job(&store, &[Platform::Facebook]).await;
    let status = orchestrator.run_job(job.id).await.unwrap();

    assert_eq!(status, JobStatus::Failed);
    assert_eq!(fb.calls(), 1);
    let step = store
        .get_job(job.id)
        .await
        .unwrap()
        .step(Platform::Facebook)
        .cloned()
        .unwrap();
    assert_eq!(step.state, StepState::FailedPermanent);
}

#[tokio::test]
async fn one_platform_failing_does_not_block_the_others() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::succeeding(Platform::Facebook, "StageKota");
    let yt = MockExecutor::new(
        Platform::Youtube,
        vec![Err(StepError::SessionNotReady("logged out".to_string()))],
    );
    let ig = MockExecutor::succeeding(Platform::Instagram, "stage.kota");
    let orchestrator = Orchestrator::new(
        store.clone(),
        vec![fb.clone() as _, yt.clone() as _, ig.clone() as _],
        retry_policy(3),
    );

    let job = make_job(
        &store,
        &[Platform::Facebook, Platform::Youtube, Platform::Instagram],
    )
    .await;
    let status = orchestrator.run_job(job.id).await.unwrap();

    // One permanent failure fails the job, but the other steps still ran.
    assert_eq!(status, JobStatus::Failed);
    let job = store.get_job(job.id).await.unwrap();
    assert_eq!(
        job.step(Platform::Facebook).unwrap().state,
        StepState::Succeeded
    );
    assert_eq!(
        job.step(Platform::Youtube).unwrap().state,
        StepState::FailedPermanent
    );
    assert_eq!(
        job.step(Platform::Instagram).unwrap().state,
        StepState::Succeeded
    );
}

#[tokio::test]
async fn failed_step_recovers_on_rerun() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::new(
        Platform::Facebook,
        vec![
            Err(StepError::External("timeout".to_string())),
            Ok(StepSuccess {
                handle: "StageKota".to_string(),
                url: "https://facebook.com/StageKota".to_string(),
                external_id: Some("123".to_string()),
            }),
        ],
    );
    let orchestrator = Orchestrator::new(store.clone(), vec![fb.clone() as _], retry_policy(3));

    let job = make_job(&store, &[Platform::Facebook]).await;
    let status = orchestrator.run_job(job.id).await.unwrap();

    assert_eq!(status, JobStatus::Succeeded);
    assert_eq!(fb.calls(), 2);
    let step = store
        .get_job(job.id)
        .await
        .unwrap()
        .step(Platform::Facebook)
        .cloned()
        .unwrap();
    assert_eq!(step.state, StepState::Succeeded);
    assert_eq!(step.attempts, 2);
    // Earlier failure detail is superseded by the success record.
    assert_eq!(step.handle.as_deref(), Some("StageKota"));
}

#[tokio::test]
async fn subset_request_never_touches_other_platforms() {
    let store = Arc::new(MemoryStatusStore::new());
    let fb = MockExecutor::succeeding(Platform::Facebook, "StageKota");
    let yt = MockExecutor::succeeding(Platform::Youtube, "StageKota");
    let ig = MockExecutor::succeeding(Platform::Instagram, "stage.kota");
    let orchestrator = Orchestrator::new(
        store.clone(),
        vec![fb.clone() as _, yt.clone() as _, ig.clone() as _],
        retry_policy(3),
    );

    let job = make_job(&store, &[Platform::Facebook]).await;
    let status = orchestrator.run_job(job.id).await.unwrap();

    assert_eq!(status, JobStatus::Succeeded);
    assert_eq!(fb.calls(), 1);
    assert_eq!(yt.calls(), 0);
    assert_eq!(ig.calls(), 0);
}

#[tokio::test]
async fn unknown_job_id_is_an_error() {
    let store = Arc::new(MemoryStatusStore::new());
    let orchestrator = Orchestrator::new(store.clone(), vec![], retry_policy(3));

    let missing = uuid::Uuid::new_v4();
    match orchestrator.run_job(missing).await {
        Err(StoreError::JobNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected JobNotFound, got {other:?}"),
    }
}
