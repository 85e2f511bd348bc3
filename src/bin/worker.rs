use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use stage_social_creator::config::AppConfig;
use stage_social_creator::db::{self, postgres::PgStatusStore, store::StatusStore};
use stage_social_creator::services::orchestrator::{self, Orchestrator};
use stage_social_creator::services::queue::{JobQueue, QueuedJob};

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting provisioning worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    let store: Arc<dyn StatusStore> = Arc::new(PgStatusStore::new(db_pool));

    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    tracing::info!("Initializing services");
    let orchestrator = Arc::new(
        orchestrator::build_orchestrator(&config, Arc::clone(&store))
            .expect("Failed to initialize services"),
    );

    // Background reconciliation: reclaim steps abandoned by dead workers
    // and put their jobs back on the queue.
    {
        let orchestrator = Arc::clone(&orchestrator);
        let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");
        let interval = Duration::from_secs(config.reconcile_interval_secs);
        let stale_after = chrono::Duration::seconds(config.step_stale_after_secs as i64);
        tokio::spawn(async move {
            loop {
                sleep(interval).await;
                match orchestrator.reconcile(stale_after).await {
                    Ok(job_ids) => {
                        for job_id in job_ids {
                            if let Err(e) = queue.enqueue(&QueuedJob::new(job_id)).await {
                                tracing::error!(
                                    %job_id,
                                    error = %e,
                                    "Failed to re-enqueue reclaimed job"
                                );
                            }
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Reconciliation pass failed"),
                }
            }
        });
    }

    tracing::info!("Worker ready, starting job processing loop");

    // Main processing loop
    loop {
        match process_next_job(&queue, &orchestrator).await {
            Ok(true) => {
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next job from the queue.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_job(
    queue: &JobQueue,
    orchestrator: &Orchestrator,
) -> Result<bool, Box<dyn std::error::Error>> {
    let job = match queue.dequeue().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    tracing::info!(job_id = %job.job_id, "Processing provisioning job");

    let status = orchestrator.run_job(job.job_id).await?;

    // Step retries happen inside run_job, so this queue entry is done
    // whatever the outcome; stalled steps come back via reconciliation.
    queue.complete(&job).await?;

    tracing::info!(job_id = %job.job_id, ?status, "Job pass finished");

    if let Ok(depth) = queue.depth().await {
        metrics::gauge!("provisioning_queue_depth").set(depth as f64);
    }

    Ok(true)
}
