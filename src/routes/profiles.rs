use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::store::StoreError;
use crate::models::platform::Platform;
use crate::models::provision::{CreateProfilesRequest, IdentityView, JobView};
use crate::naming::{self, NamingError};
use crate::services::queue::{QueueError, QueuedJob};

/// Errors surfaced to API callers as a JSON body with an `error` field.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::JobNotFound(id) => ApiError::NotFound(id),
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        ApiError::Unavailable(e.to_string())
    }
}

impl From<NamingError> for ApiError {
    fn from(e: NamingError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

/// POST /api/v1/profiles — derive handles and start provisioning.
///
/// With `dry_run` set the derived identity is returned and nothing is
/// persisted or enqueued.
pub async fn create_profiles(
    State(state): State<AppState>,
    Json(request): Json<CreateProfilesRequest>,
) -> Result<Response, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let requested: BTreeSet<Platform> = match &request.platforms {
        None => Platform::ALL.into_iter().collect(),
        Some(list) if list.is_empty() => {
            return Err(ApiError::BadRequest(
                "platforms must be omitted or non-empty".to_string(),
            ));
        }
        Some(list) => list.iter().copied().collect(),
    };

    let identity = naming::derive_identity(&request.title, &state.brand_prefix)?;

    if request.dry_run {
        return Ok(Json(IdentityView::from_identity(&identity)).into_response());
    }

    let job = state
        .store
        .create_job(&request.title, &identity, &requested)
        .await?;
    state.queue.enqueue(&QueuedJob::new(job.id)).await?;

    metrics::counter!("provisioning_jobs_total").increment(1);
    if let Ok(depth) = state.queue.depth().await {
        metrics::gauge!("provisioning_queue_depth").set(depth as f64);
    }

    tracing::info!(job_id = %job.id, title = %job.title, "provisioning job enqueued");
    Ok((StatusCode::CREATED, Json(JobView::from_job(&job))).into_response())
}

/// GET /api/v1/profiles/{job_id} — job status with per-platform steps.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    let job = state.store.get_job(job_id).await?;
    Ok(Json(JobView::from_job(&job)))
}

/// GET /api/v1/profiles — all jobs in creation order.
pub async fn list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobView>>, ApiError> {
    let jobs = state.store.list_jobs().await?;
    Ok(Json(jobs.iter().map(JobView::from_job).collect()))
}
