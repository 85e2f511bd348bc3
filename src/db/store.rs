use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::models::job::{Job, StepRecord, StepState};
use crate::models::platform::Platform;

/// Result payload attached to a step transition.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Transition carries no result (e.g. claiming a step for execution).
    None,
    /// Presence created; handle and URL as recorded by the executor.
    Success { handle: String, url: String },
    /// Failure detail for the operator.
    Failure { error: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("job {0} has no {1} step")]
    StepNotFound(Uuid, Platform),

    #[error("step {platform} of job {job_id} is {actual}, expected one of {expected:?}")]
    StateConflict {
        job_id: Uuid,
        platform: Platform,
        actual: StepState,
        expected: Vec<StepState>,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Durable record of jobs and their per-platform step states.
///
/// Jobs are append-only; only step sub-records mutate, and every step write
/// is conditional on the step's current state so a concurrent retry can
/// never be clobbered by a stale writer.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Create a job with its derived identity. Steps for requested
    /// platforms start `pending`; all others start `not_requested`.
    async fn create_job(
        &self,
        title: &str,
        identity: &Identity,
        requested: &BTreeSet<Platform>,
    ) -> Result<Job, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError>;

    /// All jobs in creation order.
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Atomically advance one step, conditioned on its current state being
    /// one of `expected`. Claiming a step (`new_state = in_progress`)
    /// increments its attempt count. Returns the updated record.
    async fn update_step(
        &self,
        job_id: Uuid,
        platform: Platform,
        expected: &[StepState],
        new_state: StepState,
        outcome: StepOutcome,
    ) -> Result<StepRecord, StoreError>;

    /// Move steps stuck `in_progress` longer than `stale_after` to `failed`
    /// so the next reconciliation pass can retry them. Returns the ids of
    /// affected jobs.
    async fn reclaim_stale_steps(
        &self,
        stale_after: chrono::Duration,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}
