use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::store::{StatusStore, StepOutcome, StoreError};
use crate::models::identity::Identity;
use crate::models::job::{Job, StepRecord, StepState};
use crate::models::platform::Platform;

/// PostgreSQL-backed status store.
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn step_from_row(row: &sqlx::postgres::PgRow) -> Result<StepRecord, StoreError> {
        let platform: String = row.try_get("platform")?;
        let state: String = row.try_get("state")?;
        Ok(StepRecord {
            platform: Platform::from_str(&platform)
                .map_err(|_| StoreError::Corrupt(format!("unknown platform {platform:?}")))?,
            state: StepState::from_str(&state)
                .map_err(|_| StoreError::Corrupt(format!("unknown step state {state:?}")))?,
            handle: row.try_get("handle")?,
            url: row.try_get("url")?,
            error: row.try_get("error")?,
            attempts: row.try_get("attempts")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn job_from_row(
        row: &sqlx::postgres::PgRow,
        mut steps: Vec<StepRecord>,
    ) -> Result<Job, StoreError> {
        let identity: serde_json::Value = row.try_get("identity")?;
        let identity: Identity = serde_json::from_value(identity)
            .map_err(|e| StoreError::Corrupt(format!("identity payload: {e}")))?;
        let requested: Vec<String> = row.try_get("requested")?;
        let requested: BTreeSet<Platform> = requested
            .iter()
            .map(|p| {
                Platform::from_str(p)
                    .map_err(|_| StoreError::Corrupt(format!("unknown platform {p:?}")))
            })
            .collect::<Result<_, _>>()?;

        // Report steps in the fixed platform order.
        steps.sort_by_key(|s| Platform::ALL.iter().position(|p| *p == s.platform));

        Ok(Job {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            identity,
            requested,
            steps,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn steps_for(&self, job_id: Uuid) -> Result<Vec<StepRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT platform, state, handle, url, error, attempts, updated_at
            FROM provision_steps
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::step_from_row).collect()
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn create_job(
        &self,
        title: &str,
        identity: &Identity,
        requested: &BTreeSet<Platform>,
    ) -> Result<Job, StoreError> {
        let id = Uuid::new_v4();
        let identity_json = serde_json::to_value(identity)
            .map_err(|e| StoreError::Corrupt(format!("identity payload: {e}")))?;
        let requested_tags: Vec<String> = requested.iter().map(|p| p.to_string()).collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO provision_jobs (id, title, identity, requested)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(&identity_json)
        .bind(&requested_tags)
        .execute(&mut *tx)
        .await?;

        for platform in Platform::ALL {
            let state = if requested.contains(&platform) {
                StepState::Pending
            } else {
                StepState::NotRequested
            };
            sqlx::query(
                r#"
                INSERT INTO provision_steps (job_id, platform, state)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(id)
            .bind(platform.to_string())
            .bind(state.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_job(id).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, identity, requested, created_at
            FROM provision_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::JobNotFound(id))?;

        let steps = self.steps_for(id).await?;
        Self::job_from_row(&row, steps)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let job_rows = sqlx::query(
            r#"
            SELECT id, title, identity, requested, created_at
            FROM provision_jobs
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let step_rows = sqlx::query(
            r#"
            SELECT job_id, platform, state, handle, url, error, attempts, updated_at
            FROM provision_steps
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut steps_by_job: HashMap<Uuid, Vec<StepRecord>> = HashMap::new();
        for row in &step_rows {
            let job_id: Uuid = row.try_get("job_id")?;
            steps_by_job
                .entry(job_id)
                .or_default()
                .push(Self::step_from_row(row)?);
        }

        job_rows
            .iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                Self::job_from_row(row, steps_by_job.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn update_step(
        &self,
        job_id: Uuid,
        platform: Platform,
        expected: &[StepState],
        new_state: StepState,
        outcome: StepOutcome,
    ) -> Result<StepRecord, StoreError> {
        let expected_tags: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        let (handle, url, error) = match outcome {
            StepOutcome::None => (None, None, None),
            StepOutcome::Success { handle, url } => (Some(handle), Some(url), None),
            StepOutcome::Failure { error } => (None, None, Some(error)),
        };

        let row = sqlx::query(
            r#"
            UPDATE provision_steps
            SET state = $1,
                handle = COALESCE($2, handle),
                url = COALESCE($3, url),
                error = $4,
                attempts = attempts + CASE WHEN $1 = 'in_progress' THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE job_id = $5 AND platform = $6 AND state = ANY($7)
            RETURNING platform, state, handle, url, error, attempts, updated_at
            "#,
        )
        .bind(new_state.to_string())
        .bind(handle)
        .bind(url)
        .bind(error)
        .bind(job_id)
        .bind(platform.to_string())
        .bind(&expected_tags)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::step_from_row(&row),
            None => {
                // Distinguish a lost race from a missing record.
                let current = sqlx::query(
                    r#"
                    SELECT state FROM provision_steps
                    WHERE job_id = $1 AND platform = $2
                    "#,
                )
                .bind(job_id)
                .bind(platform.to_string())
                .fetch_optional(&self.pool)
                .await?;

                match current {
                    Some(row) => {
                        let state: String = row.try_get("state")?;
                        let actual = StepState::from_str(&state).map_err(|_| {
                            StoreError::Corrupt(format!("unknown step state {state:?}"))
                        })?;
                        Err(StoreError::StateConflict {
                            job_id,
                            platform,
                            actual,
                            expected: expected.to_vec(),
                        })
                    }
                    None => Err(StoreError::StepNotFound(job_id, platform)),
                }
            }
        }
    }

    async fn reclaim_stale_steps(
        &self,
        stale_after: chrono::Duration,
    ) -> Result<Vec<Uuid>, StoreError> {
        let cutoff: DateTime<Utc> = Utc::now() - stale_after;
        let rows = sqlx::query(
            r#"
            UPDATE provision_steps
            SET state = 'failed',
                error = 'step stalled in progress; worker presumed lost',
                updated_at = NOW()
            WHERE state = 'in_progress' AND updated_at < $1
            RETURNING job_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut ids: Vec<Uuid> = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("job_id"))
            .collect::<Result<_, _>>()?;
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
