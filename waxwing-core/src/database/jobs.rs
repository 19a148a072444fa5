//! Database-backed enrichment job queue.
//!
//! Dedupe is a partial unique index over active rows; claiming is a single
//! atomic UPDATE whose target set comes from a row-locked, skip-locked
//! SELECT, so concurrent workers never block on or double-claim a row.
//! A crashed worker leaves a running row behind; its stale lock makes it
//! claimable again once the lease times out.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::Result;
use crate::model::job::{
    EnqueueOutcome, EnrichmentJob, EntityKind, JobKind, JobStatus, QueueStats,
};
use crate::types::JobId;

#[derive(sqlx::FromRow)]
struct JobRow {
    id: JobId,
    job_kind: String,
    entity_kind: String,
    entity_id: Uuid,
    status: String,
    priority: i32,
    attempts: i32,
    max_attempts: i32,
    run_after: DateTime<Utc>,
    locked_at: Option<DateTime<Utc>>,
    locked_by: Option<String>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<EnrichmentJob> {
        Ok(EnrichmentJob {
            id: self.id,
            job_kind: JobKind::parse(&self.job_kind)?,
            entity_kind: EntityKind::parse(&self.entity_kind)?,
            entity_id: self.entity_id,
            status: JobStatus::parse(&self.status)?,
            priority: self.priority,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            run_after: self.run_after,
            locked_at: self.locked_at,
            locked_by: self.locked_by,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const COLUMNS: &str = "id, job_kind, entity_kind, entity_id, status, priority, attempts, \
     max_attempts, run_after, locked_at, locked_by, last_error, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct JobQueue {
    pool: PgPool,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(pool: PgPool, config: QueueConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub async fn enqueue(&self, kind: JobKind, entity_id: Uuid) -> Result<EnqueueOutcome> {
        self.enqueue_with(kind, entity_id, 0).await
    }

    /// Insert a job unless an active one already exists for the same
    /// (kind, entity). The partial unique index arbitrates atomically; on
    /// conflict the existing active job's id is returned.
    pub async fn enqueue_with(
        &self,
        kind: JobKind,
        entity_id: Uuid,
        priority: i32,
    ) -> Result<EnqueueOutcome> {
        let entity_kind = kind.entity_kind();

        // The insert and the lookup race against concurrent enqueues and
        // completions; one extra round settles any interleaving.
        for _ in 0..2 {
            let inserted: Option<JobId> = sqlx::query_scalar(
                r#"
                INSERT INTO enrichment_jobs
                    (job_kind, entity_kind, entity_id, priority, max_attempts)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (job_kind, entity_kind, entity_id)
                    WHERE status IN ('pending', 'running')
                    DO NOTHING
                RETURNING id
                "#,
            )
            .bind(kind.as_str())
            .bind(entity_kind.as_str())
            .bind(entity_id)
            .bind(priority)
            .bind(self.config.default_max_attempts)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(job_id) = inserted {
                debug!(%job_id, kind = %kind, %entity_id, "enqueued enrichment job");
                return Ok(EnqueueOutcome::created(job_id));
            }

            let existing: Option<JobId> = sqlx::query_scalar(
                r#"
                SELECT id FROM enrichment_jobs
                WHERE job_kind = $1 AND entity_kind = $2 AND entity_id = $3
                  AND status IN ('pending', 'running')
                "#,
            )
            .bind(kind.as_str())
            .bind(entity_kind.as_str())
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(job_id) = existing {
                return Ok(EnqueueOutcome::already_active(job_id));
            }
        }

        Err(crate::error::CoreError::Internal(format!(
            "could not enqueue or find active job {kind} for entity {entity_id}"
        )))
    }

    /// Atomically claim up to `limit` jobs for `worker_id`: pending rows
    /// whose run_after has passed, plus running rows whose lease expired.
    /// Priority DESC then FIFO.
    pub async fn claim_batch(&self, worker_id: &str, limit: i64) -> Result<Vec<EnrichmentJob>> {
        let lease_cutoff = Utc::now() - Duration::seconds(self.config.lease_timeout_secs);

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            WITH claimable AS (
                SELECT id FROM enrichment_jobs
                WHERE (status = 'pending' AND run_after <= now())
                   OR (status = 'running' AND locked_at < $3)
                ORDER BY priority DESC, created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT $1
            )
            UPDATE enrichment_jobs j
            SET status = 'running',
                locked_at = now(),
                locked_by = $2,
                updated_at = now()
            FROM claimable c
            WHERE j.id = c.id
            RETURNING j.id, j.job_kind, j.entity_kind, j.entity_id, j.status,
                      j.priority, j.attempts, j.max_attempts, j.run_after,
                      j.locked_at, j.locked_by, j.last_error, j.created_at,
                      j.updated_at
            "#,
        )
        .bind(limit)
        .bind(worker_id)
        .bind(lease_cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(row.into_job()?);
        }
        // UPDATE ... RETURNING has no row-order guarantee; restore delivery
        // order so callers process highest priority first.
        jobs.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        if !jobs.is_empty() {
            debug!(worker_id, count = jobs.len(), "claimed enrichment jobs");
        }
        Ok(jobs)
    }

    /// Mark a job succeeded and stamp the entity's last-enriched column.
    pub async fn complete(&self, job: &EnrichmentJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrichment_jobs
            SET status = 'succeeded', locked_at = NULL, locked_by = NULL,
                last_error = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        let table = match job.entity_kind {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Track => "tracks",
        };
        sqlx::query(&format!(
            "UPDATE {table} SET last_enriched_at = now(), updated_at = now() WHERE id = $1"
        ))
        .bind(job.entity_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt. Retries with exponential backoff until the
    /// attempt limit is exhausted, then parks the job as failed.
    pub async fn fail(&self, job: &EnrichmentJob, error: &str) -> Result<()> {
        let attempts = job.attempts + 1;
        if attempts >= job.max_attempts {
            info!(job_id = %job.id, kind = %job.job_kind, attempts, error,
                  "enrichment job failed permanently");
            sqlx::query(
                r#"
                UPDATE enrichment_jobs
                SET status = 'failed', attempts = $2, last_error = $3,
                    locked_at = NULL, locked_by = NULL, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(job.id)
            .bind(attempts)
            .bind(error)
            .execute(&self.pool)
            .await?;
            return Ok(());
        }

        let backoff = self.backoff_for_attempt(attempts);
        debug!(job_id = %job.id, attempts, backoff_secs = backoff.num_seconds(), error,
               "enrichment job failed, scheduling retry");
        sqlx::query(
            r#"
            UPDATE enrichment_jobs
            SET status = 'pending', attempts = $2, last_error = $3,
                run_after = $4, locked_at = NULL, locked_by = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(attempts)
        .bind(error)
        .bind(Utc::now() + backoff)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `min(base × multiplier^(attempt−1), cap)`.
    pub fn backoff_for_attempt(&self, attempt: i32) -> Duration {
        let base = self.config.retry_backoff_base_secs as f64;
        let exp = base
            * self
                .config
                .retry_backoff_multiplier
                .powi((attempt - 1).max(0));
        let capped = exp.min(self.config.retry_backoff_cap_secs as f64);
        Duration::seconds(capped as i64)
    }

    /// Delete terminal rows older than the TTL.
    pub async fn reap(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::seconds(self.config.completed_ttl_secs);
        let result = sqlx::query(
            "DELETE FROM enrichment_jobs \
             WHERE status IN ('succeeded', 'failed') AND updated_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            info!(reaped = result.rows_affected(), "reaped terminal enrichment jobs");
        }
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: JobId) -> Result<Option<EnrichmentJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {COLUMNS} FROM enrichment_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobRow::into_job).transpose()
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM enrichment_jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => stats.pending = count,
                "running" => stats.running = count,
                "succeeded" => stats.succeeded = count,
                "failed" => stats.failed = count,
                _ => {}
            }
        }
        Ok(stats)
    }
}
