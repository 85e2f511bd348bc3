use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::models::job::{Job, JobStatus, StepState};
use crate::models::platform::Platform;

/// Request to provision social profiles for a title.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfilesRequest {
    #[garde(length(min = 1, max = 200))]
    pub title: String,

    /// Platforms to target. Omitted means all three.
    #[garde(skip)]
    pub platforms: Option<Vec<Platform>>,

    /// Compute and return the derived handles without creating a job.
    #[garde(skip)]
    #[serde(default)]
    pub dry_run: bool,
}

/// Per-platform handle preview, same shape for dry-run and job responses.
#[derive(Debug, Serialize)]
pub struct HandlePreview {
    pub handle: String,
    pub display_name: String,
    pub url: String,
}

/// Derived handles for all platforms (dry-run response body).
#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub input_title: String,
    pub roman_form: String,
    pub slug: String,
    pub handles: BTreeMap<Platform, HandlePreview>,
}

impl IdentityView {
    pub fn from_identity(identity: &Identity) -> Self {
        let handles = Platform::ALL
            .iter()
            .map(|&p| {
                (
                    p,
                    HandlePreview {
                        handle: identity.handle_for(p).to_string(),
                        display_name: identity.display_name_for(p).to_string(),
                        url: identity.url_for(p),
                    },
                )
            })
            .collect();
        Self {
            input_title: identity.input_title.clone(),
            roman_form: identity.roman_form.clone(),
            slug: identity.slug.clone(),
            handles,
        }
    }
}

/// Per-platform state reported to callers.
#[derive(Debug, Serialize)]
pub struct StepView {
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: i32,
}

/// Job shape shared by the HTTP responses and the CLI output.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub title: String,
    pub status: JobStatus,
    pub identity: IdentityView,
    pub steps: BTreeMap<Platform, StepView>,
    pub created_at: DateTime<Utc>,
}

impl JobView {
    pub fn from_job(job: &Job) -> Self {
        let steps = job
            .steps
            .iter()
            .map(|s| {
                (
                    s.platform,
                    StepView {
                        state: s.state,
                        handle: s.handle.clone(),
                        url: s.url.clone(),
                        error: s.error.clone(),
                        attempts: s.attempts,
                    },
                )
            })
            .collect();
        Self {
            job_id: job.id,
            title: job.title.clone(),
            status: job.overall_status(),
            identity: IdentityView::from_identity(&job.identity),
            steps,
            created_at: job.created_at,
        }
    }
}
