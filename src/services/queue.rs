use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const QUEUE_KEY: &str = "social_creator:jobs";
const PROCESSING_KEY: &str = "social_creator:processing";

/// Job hand-off payload between the HTTP intake and the worker. The job
/// record itself lives in the status store; the queue only carries the id.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: Uuid,
}

impl QueuedJob {
    pub fn new(job_id: Uuid) -> Self {
        Self { job_id }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Redis-backed hand-off queue.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Hand a job to the worker.
    pub async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        self.conn().await?.lpush::<_, _, ()>(QUEUE_KEY, &payload).await?;
        Ok(())
    }

    /// Pop the next job, parking it on the processing list until the
    /// worker acknowledges with [`JobQueue::complete`].
    pub async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        let payload: Option<String> = self
            .conn()
            .await?
            .rpoplpush(QUEUE_KEY, PROCESSING_KEY)
            .await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Acknowledge a processed job.
    pub async fn complete(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        self.conn()
            .await?
            .lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await?;
        Ok(())
    }

    /// Pending jobs, for the queue depth gauge.
    pub async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.conn().await?.llen(QUEUE_KEY).await?)
    }

    /// Connectivity check for health reporting.
    pub async fn health_check(&self) -> Result<(), QueueError> {
        redis::cmd("PING")
            .query_async::<String>(&mut self.conn().await?)
            .await?;
        Ok(())
    }
}
