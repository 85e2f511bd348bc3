//! Per-job step fan-out with bounded retries.
//!
//! Steps for a job run concurrently; each step is claimed with a conditional
//! store write before any external call, so two workers racing on the same
//! job settle on exactly one owner per step. A step that already succeeded
//! is never dispatched again, which is what makes whole-job re-runs safe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::store::{StatusStore, StepOutcome, StoreError};
use crate::models::job::{Job, JobStatus, StepState};
use crate::models::platform::Platform;
use crate::services::browser::BrowserBridgeClient;
use crate::services::device::CloudPhoneClient;
use crate::services::executor::{StepError, StepExecutor};
use crate::services::facebook::FacebookExecutor;
use crate::services::instagram::{InstagramConfig, InstagramExecutor};
use crate::services::otp::{FiveSimProvider, OtpCoordinator, OtpProvider, SmsManProvider};
use crate::services::youtube::YoutubeExecutor;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per step, including the first.
    pub max_attempts: i32,
    /// Backoff before try n is `backoff_base * n`.
    pub backoff_base: Duration,
}

pub struct Orchestrator {
    store: Arc<dyn StatusStore>,
    executors: HashMap<Platform, Arc<dyn StepExecutor>>,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        executors: Vec<Arc<dyn StepExecutor>>,
        retry: RetryPolicy,
    ) -> Self {
        let executors = executors.into_iter().map(|e| (e.platform(), e)).collect();
        Self {
            store,
            executors,
            retry,
        }
    }

    /// Run every requested step of a job to a terminal state and return the
    /// job's resulting overall status. Safe to call again on a finished or
    /// half-finished job.
    pub async fn run_job(&self, job_id: Uuid) -> Result<JobStatus, StoreError> {
        let job = self.store.get_job(job_id).await?;
        info!(%job_id, title = %job.title, platforms = ?job.requested, "running provisioning job");

        let mut set = JoinSet::new();
        for platform in &job.requested {
            let Some(executor) = self.executors.get(platform) else {
                warn!(%job_id, %platform, "no executor configured, leaving step pending");
                continue;
            };
            let store = Arc::clone(&self.store);
            let executor = Arc::clone(executor);
            let retry = self.retry.clone();
            let job = job.clone();
            set.spawn(async move {
                run_step(store, executor, &job, retry).await;
            });
        }
        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                error!(%job_id, "step task panicked: {e}");
            }
        }

        let job = self.store.get_job(job_id).await?;
        let status = job.overall_status();
        info!(%job_id, ?status, "provisioning job finished");
        Ok(status)
    }

    /// Move steps stuck `in_progress` past `stale_after` back to a
    /// retryable state. Returns the affected job ids so the caller can
    /// re-enqueue them.
    pub async fn reconcile(&self, stale_after: chrono::Duration) -> Result<Vec<Uuid>, StoreError> {
        let reclaimed = self.store.reclaim_stale_steps(stale_after).await?;
        if !reclaimed.is_empty() {
            warn!(jobs = reclaimed.len(), "reclaimed stalled steps");
        }
        Ok(reclaimed)
    }
}

/// Wire the per-platform executors and retry policy from configuration.
/// Shared by the worker binary and the CLI.
pub fn build_orchestrator(
    config: &AppConfig,
    store: Arc<dyn StatusStore>,
) -> Result<Orchestrator, Box<dyn std::error::Error + Send + Sync>> {
    let bridge = Arc::new(BrowserBridgeClient::new(&config.browser_bridge_url)?);
    let devices = Arc::new(CloudPhoneClient::new(
        &config.cloud_phone_api_base,
        &config.cloud_phone_api_token,
    )?);

    let mut providers: Vec<Arc<dyn OtpProvider>> = Vec::new();
    for name in config.otp_providers.split(',').map(str::trim) {
        match name {
            "smsman" if !config.smsman_api_key.is_empty() => {
                providers.push(Arc::new(SmsManProvider::new(config.smsman_api_key.clone())?));
            }
            "fivesim" if !config.fivesim_api_key.is_empty() => {
                providers.push(Arc::new(FiveSimProvider::new(
                    config.fivesim_api_key.clone(),
                )?));
            }
            "" => {}
            other => warn!(provider = other, "otp provider skipped (unknown or no key)"),
        }
    }
    if providers.is_empty() {
        warn!("no otp providers configured; instagram signups will fail");
    }
    let otp = Arc::new(OtpCoordinator::new(
        providers,
        Duration::from_secs(config.otp_poll_interval_secs),
        config.otp_max_poll_failures,
    ));

    let executors: Vec<Arc<dyn StepExecutor>> = vec![
        Arc::new(FacebookExecutor::new(bridge.clone())),
        Arc::new(YoutubeExecutor::new(bridge)),
        Arc::new(InstagramExecutor::new(
            devices,
            otp,
            InstagramConfig {
                proxy_url: config.proxy_url.clone(),
                warmup_template: config.instagram_warmup_template.clone(),
                otp_country: config.otp_country.clone(),
                otp_max_wait: Duration::from_secs(config.otp_max_wait_secs),
            },
        )),
    ];

    Ok(Orchestrator::new(
        store,
        executors,
        RetryPolicy {
            max_attempts: config.max_step_attempts as i32,
            backoff_base: Duration::from_secs(config.retry_backoff_secs),
        },
    ))
}

async fn run_step(
    store: Arc<dyn StatusStore>,
    executor: Arc<dyn StepExecutor>,
    job: &Job,
    retry: RetryPolicy,
) {
    let platform = executor.platform();
    let job_id = job.id;

    match job.step(platform).map(|s| s.state) {
        Some(StepState::Succeeded) => {
            info!(%job_id, %platform, "step already succeeded, skipping");
            return;
        }
        Some(StepState::FailedPermanent) => {
            info!(%job_id, %platform, "step permanently failed, skipping");
            return;
        }
        Some(StepState::NotRequested) | None => return,
        Some(StepState::Pending | StepState::Failed | StepState::InProgress) => {}
    }

    loop {
        // Claim the step. A conflict means another worker holds it.
        let claimed = match store
            .update_step(
                job_id,
                platform,
                &[StepState::Pending, StepState::Failed],
                StepState::InProgress,
                StepOutcome::None,
            )
            .await
        {
            Ok(record) => record,
            Err(StoreError::StateConflict { actual, .. }) => {
                info!(%job_id, %platform, %actual, "step claimed elsewhere or already settled");
                return;
            }
            Err(e) => {
                error!(%job_id, %platform, "failed to claim step: {e}");
                return;
            }
        };

        let attempt = claimed.attempts;
        info!(%job_id, %platform, attempt, "executing step");
        let started = std::time::Instant::now();
        let result = executor.execute(&job.identity).await;
        metrics::histogram!(
            "provisioning_step_duration_seconds",
            "platform" => platform.to_string(),
        )
        .record(started.elapsed().as_secs_f64());

        match result {
            Ok(success) => {
                metrics::counter!(
                    "provisioning_steps_total",
                    "platform" => platform.to_string(),
                    "result" => "succeeded",
                )
                .increment(1);
                info!(%job_id, %platform, handle = %success.handle, "step succeeded");
                if let Err(e) = store
                    .update_step(
                        job_id,
                        platform,
                        &[StepState::InProgress],
                        StepState::Succeeded,
                        StepOutcome::Success {
                            handle: success.handle,
                            url: success.url,
                        },
                    )
                    .await
                {
                    error!(%job_id, %platform, "failed to record step success: {e}");
                }
                return;
            }
            Err(step_error) => {
                let retryable = step_error.is_retryable() && attempt < retry.max_attempts;
                let new_state = if retryable {
                    StepState::Failed
                } else {
                    StepState::FailedPermanent
                };
                metrics::counter!(
                    "provisioning_steps_total",
                    "platform" => platform.to_string(),
                    "result" => if retryable { "failed" } else { "failed_permanent" },
                )
                .increment(1);
                warn!(
                    %job_id, %platform, attempt, retryable,
                    kind = error_kind(&step_error),
                    error = %step_error,
                    "step failed"
                );
                if let Err(e) = store
                    .update_step(
                        job_id,
                        platform,
                        &[StepState::InProgress],
                        new_state,
                        StepOutcome::Failure {
                            error: step_error.to_string(),
                        },
                    )
                    .await
                {
                    error!(%job_id, %platform, "failed to record step failure: {e}");
                    return;
                }
                if !retryable {
                    return;
                }
                tokio::time::sleep(retry.backoff_base * attempt as u32).await;
            }
        }
    }
}

/// Classify a step error for log labels without losing the detail message.
pub fn error_kind(e: &StepError) -> &'static str {
    match e {
        StepError::SessionNotReady(_) => "session_not_ready",
        StepError::HandleUnavailable(_) => "handle_unavailable",
        StepError::OtpTimeout => "otp_timeout",
        StepError::NoNumberAvailable => "no_number_available",
        StepError::External(_) => "external",
    }
}
