use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::store::{StatusStore, StepOutcome, StoreError};
use crate::models::identity::Identity;
use crate::models::job::{Job, StepRecord, StepState};
use crate::models::platform::Platform;

/// In-memory status store for tests and local development.
///
/// Mirrors the PostgreSQL backend's semantics: conditional step writes,
/// attempt counting on claim, insertion-ordered listing.
#[derive(Default)]
pub struct MemoryStatusStore {
    jobs: Mutex<Vec<Job>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn create_job(
        &self,
        title: &str,
        identity: &Identity,
        requested: &BTreeSet<Platform>,
    ) -> Result<Job, StoreError> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            title: title.to_string(),
            identity: identity.clone(),
            requested: requested.clone(),
            steps: Platform::ALL
                .iter()
                .map(|&p| StepRecord::initial(p, requested.contains(&p), now))
                .collect(),
            created_at: now,
        };
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or(StoreError::JobNotFound(id))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn update_step(
        &self,
        job_id: Uuid,
        platform: Platform,
        expected: &[StepState],
        new_state: StepState,
        outcome: StepOutcome,
    ) -> Result<StepRecord, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(StoreError::JobNotFound(job_id))?;
        let step = job
            .steps
            .iter_mut()
            .find(|s| s.platform == platform)
            .ok_or(StoreError::StepNotFound(job_id, platform))?;

        if !expected.contains(&step.state) {
            return Err(StoreError::StateConflict {
                job_id,
                platform,
                actual: step.state,
                expected: expected.to_vec(),
            });
        }

        step.state = new_state;
        if new_state == StepState::InProgress {
            step.attempts += 1;
        }
        match outcome {
            StepOutcome::None => step.error = None,
            StepOutcome::Success { handle, url } => {
                step.handle = Some(handle);
                step.url = Some(url);
                step.error = None;
            }
            StepOutcome::Failure { error } => step.error = Some(error),
        }
        step.updated_at = Utc::now();
        Ok(step.clone())
    }

    async fn reclaim_stale_steps(
        &self,
        stale_after: chrono::Duration,
    ) -> Result<Vec<Uuid>, StoreError> {
        let cutoff = Utc::now() - stale_after;
        let mut affected = Vec::new();
        let mut jobs = self.jobs.lock().unwrap();
        for job in jobs.iter_mut() {
            for step in job.steps.iter_mut() {
                if step.state == StepState::InProgress && step.updated_at < cutoff {
                    step.state = StepState::Failed;
                    step.error = Some("step stalled in progress; worker presumed lost".into());
                    step.updated_at = Utc::now();
                    if !affected.contains(&job.id) {
                        affected.push(job.id);
                    }
                }
            }
        }
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
