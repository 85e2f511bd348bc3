use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::models::platform::Platform;

/// State of one platform's provisioning step.
///
/// `NotRequested` is initial-only: a step the operator did not select never
/// leaves it and is excluded from the overall job status. All other steps
/// advance `Pending -> InProgress -> {Succeeded | Failed}`, with `Failed`
/// re-entering `InProgress` until the attempt budget runs out, at which
/// point the step lands in `FailedPermanent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepState {
    NotRequested,
    Pending,
    InProgress,
    Succeeded,
    Failed,
    FailedPermanent,
}

impl StepState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Succeeded | StepState::FailedPermanent)
    }

    /// Whether this state may legally advance to `next`. States only move
    /// forward through the graph; no transition ever reverts silently.
    pub fn can_transition_to(self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Succeeded)
                | (InProgress, Failed)
                | (InProgress, FailedPermanent)
                | (Failed, InProgress)
                | (Failed, FailedPermanent)
        )
    }
}

/// One platform's provisioning attempt within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub platform: Platform,
    pub state: StepState,
    /// Set only on success.
    pub handle: Option<String>,
    /// Set only on success.
    pub url: Option<String>,
    /// Set only on failure.
    pub error: Option<String>,
    pub attempts: i32,
    pub updated_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn initial(platform: Platform, requested: bool, now: DateTime<Utc>) -> Self {
        Self {
            platform,
            state: if requested { StepState::Pending } else { StepState::NotRequested },
            handle: None,
            url: None,
            error: None,
            attempts: 0,
            updated_at: now,
        }
    }
}

/// Overall status of a job, derived from its requested steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
}

/// One title-provisioning request. Append-only: the job itself never
/// changes after creation, only its step sub-records do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub identity: Identity,
    pub requested: BTreeSet<Platform>,
    pub steps: Vec<StepRecord>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn step(&self, platform: Platform) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.platform == platform)
    }

    /// `Succeeded` iff every requested step succeeded, `Failed` iff any
    /// requested step is permanently failed, `InProgress` otherwise.
    pub fn overall_status(&self) -> JobStatus {
        let requested: Vec<&StepRecord> = self
            .steps
            .iter()
            .filter(|s| self.requested.contains(&s.platform))
            .collect();

        if requested.iter().any(|s| s.state == StepState::FailedPermanent) {
            JobStatus::Failed
        } else if !requested.is_empty() && requested.iter().all(|s| s.state == StepState::Succeeded)
        {
            JobStatus::Succeeded
        } else {
            JobStatus::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(states: &[(Platform, StepState)], requested: &[Platform]) -> Job {
        let now = Utc::now();
        let identity = crate::naming::derive_identity("Kota", "STAGE").unwrap();
        Job {
            id: Uuid::new_v4(),
            title: "Kota".into(),
            identity,
            requested: requested.iter().copied().collect(),
            steps: states
                .iter()
                .map(|(p, s)| StepRecord {
                    platform: *p,
                    state: *s,
                    handle: None,
                    url: None,
                    error: None,
                    attempts: 0,
                    updated_at: now,
                })
                .collect(),
            created_at: now,
        }
    }

    #[test]
    fn forward_transitions_allowed() {
        use StepState::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Succeeded));
        assert!(InProgress.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(FailedPermanent));
        assert!(Failed.can_transition_to(InProgress));
        assert!(Failed.can_transition_to(FailedPermanent));
    }

    #[test]
    fn reverse_and_skip_transitions_rejected() {
        use StepState::*;
        assert!(!Succeeded.can_transition_to(InProgress));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!FailedPermanent.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!NotRequested.can_transition_to(Pending));
        assert!(!NotRequested.can_transition_to(InProgress));
    }

    #[test]
    fn overall_succeeded_when_all_requested_succeed() {
        let job = job_with(
            &[
                (Platform::Facebook, StepState::Succeeded),
                (Platform::Youtube, StepState::Succeeded),
                (Platform::Instagram, StepState::NotRequested),
            ],
            &[Platform::Facebook, Platform::Youtube],
        );
        assert_eq!(job.overall_status(), JobStatus::Succeeded);
    }

    #[test]
    fn overall_failed_when_any_requested_permanently_fails() {
        let job = job_with(
            &[
                (Platform::Facebook, StepState::Succeeded),
                (Platform::Youtube, StepState::FailedPermanent),
                (Platform::Instagram, StepState::NotRequested),
            ],
            &[Platform::Facebook, Platform::Youtube],
        );
        assert_eq!(job.overall_status(), JobStatus::Failed);
    }

    #[test]
    fn overall_in_progress_while_any_step_pending_or_retrying() {
        for state in [StepState::Pending, StepState::InProgress, StepState::Failed] {
            let job = job_with(
                &[
                    (Platform::Facebook, StepState::Succeeded),
                    (Platform::Youtube, state),
                    (Platform::Instagram, StepState::NotRequested),
                ],
                &[Platform::Facebook, Platform::Youtube],
            );
            assert_eq!(job.overall_status(), JobStatus::InProgress, "state {state}");
        }
    }

    #[test]
    fn not_requested_steps_do_not_affect_overall_status() {
        let job = job_with(
            &[
                (Platform::Facebook, StepState::Succeeded),
                (Platform::Youtube, StepState::NotRequested),
                (Platform::Instagram, StepState::NotRequested),
            ],
            &[Platform::Facebook],
        );
        assert_eq!(job.overall_status(), JobStatus::Succeeded);
    }

    #[test]
    fn step_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StepState::FailedPermanent).unwrap(),
            "\"failed_permanent\""
        );
        assert_eq!(StepState::NotRequested.to_string(), "not_requested");
    }
}
