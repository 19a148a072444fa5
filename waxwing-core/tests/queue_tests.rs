//! Behavioural tests for the enrichment job queue: active-job dedupe,
//! claim ordering, lease recovery, retry backoff, and reaping.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use waxwing_core::model::job::{JobKind, JobStatus};

#[path = "support/mod.rs"]
mod support;

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn enqueue_dedupes_active_jobs(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let entity = Uuid::new_v4();

    let first = db
        .jobs()
        .enqueue(JobKind::ArtistSyncRelationships, entity)
        .await?;
    assert!(first.created);

    let second = db
        .jobs()
        .enqueue(JobKind::ArtistSyncRelationships, entity)
        .await?;
    assert!(!second.created);
    assert_eq!(second.reason, Some("already_active"));
    assert_eq!(second.job_id, first.job_id);

    // A different kind for the same entity is its own job.
    let other_kind = db.jobs().enqueue(JobKind::ArtistResolveMbid, entity).await?;
    assert!(other_kind.created);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn claim_orders_by_priority_then_age(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);

    let low_old = db
        .jobs()
        .enqueue_with(JobKind::TrackSync, Uuid::new_v4(), 0)
        .await?;
    let low_new = db
        .jobs()
        .enqueue_with(JobKind::TrackSync, Uuid::new_v4(), 0)
        .await?;
    let high = db
        .jobs()
        .enqueue_with(JobKind::TrackSync, Uuid::new_v4(), 5)
        .await?;

    let claimed = db.jobs().claim_batch("worker-a", 3).await?;
    let ids: Vec<_> = claimed.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![high.job_id, low_old.job_id, low_new.job_id]);
    assert!(claimed.iter().all(|j| j.status == JobStatus::Running));
    assert!(claimed
        .iter()
        .all(|j| j.locked_by.as_deref() == Some("worker-a")));

    // Nothing left to claim.
    assert!(db.jobs().claim_batch("worker-b", 3).await?.is_empty());
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn stale_lease_is_reclaimable(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool.clone());

    let job = db.jobs().enqueue(JobKind::AlbumSync, Uuid::new_v4()).await?;
    let claimed = db.jobs().claim_batch("worker-a", 1).await?;
    assert_eq!(claimed.len(), 1);

    // A fresh lease is not claimable by another worker.
    assert!(db.jobs().claim_batch("worker-b", 1).await?.is_empty());

    // Age the lock past the lease timeout, simulating a crashed worker.
    sqlx::query("UPDATE enrichment_jobs SET locked_at = $2 WHERE id = $1")
        .bind(job.job_id)
        .bind(Utc::now() - Duration::hours(2))
        .execute(&pool)
        .await?;

    let reclaimed = db.jobs().claim_batch("worker-b", 1).await?;
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, job.job_id);
    assert_eq!(reclaimed[0].locked_by.as_deref(), Some("worker-b"));
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn run_after_gates_claims(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool.clone());

    let job = db.jobs().enqueue(JobKind::TrackResolveMbid, Uuid::new_v4()).await?;
    sqlx::query("UPDATE enrichment_jobs SET run_after = $2 WHERE id = $1")
        .bind(job.job_id)
        .bind(Utc::now() + Duration::minutes(10))
        .execute(&pool)
        .await?;

    assert!(db.jobs().claim_batch("worker-a", 1).await?.is_empty());
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn fail_retries_with_backoff_until_exhausted(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);

    db.jobs().enqueue(JobKind::TrackSync, Uuid::new_v4()).await?;
    let mut job = db.jobs().claim_batch("worker-a", 1).await?.remove(0);
    let max_attempts = job.max_attempts;

    for attempt in 1..max_attempts {
        db.jobs().fail(&job, "metadata service unavailable").await?;
        let reloaded = db.jobs().get(job.id).await?.expect("job exists");
        assert_eq!(reloaded.status, JobStatus::Pending);
        assert_eq!(reloaded.attempts, attempt);
        assert!(reloaded.run_after > Utc::now());
        assert_eq!(
            reloaded.last_error.as_deref(),
            Some("metadata service unavailable")
        );
        job = reloaded;
    }

    db.jobs().fail(&job, "still down").await?;
    let terminal = db.jobs().get(job.id).await?.expect("job exists");
    assert_eq!(terminal.status, JobStatus::Failed);
    assert_eq!(terminal.attempts, max_attempts);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn backoff_schedule_is_exponential_and_capped(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let queue = db.jobs();

    assert_eq!(queue.backoff_for_attempt(1).num_seconds(), 60);
    assert_eq!(queue.backoff_for_attempt(2).num_seconds(), 120);
    assert_eq!(queue.backoff_for_attempt(3).num_seconds(), 240);
    // 60 * 2^6 = 3840 > cap.
    assert_eq!(queue.backoff_for_attempt(7).num_seconds(), 3_600);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn complete_stamps_entity_and_terminal_jobs_reap(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool.clone());

    let artist = db.catalog().insert_artist("Emancipator", None).await?;
    db.jobs()
        .enqueue(JobKind::ArtistResolveMbid, artist.id.as_uuid())
        .await?;
    let job = db.jobs().claim_batch("worker-a", 1).await?.remove(0);
    db.jobs().complete(&job).await?;

    let enriched = db.catalog().get_artist(artist.id).await?.expect("artist");
    assert!(enriched.last_enriched_at.is_some());

    // A completed job frees the dedupe slot for a new enqueue.
    let again = db
        .jobs()
        .enqueue(JobKind::ArtistResolveMbid, artist.id.as_uuid())
        .await?;
    assert!(again.created);

    // Age the first (terminal) job past the TTL and reap it.
    sqlx::query("UPDATE enrichment_jobs SET updated_at = $2 WHERE id = $1")
        .bind(job.id)
        .bind(Utc::now() - Duration::days(7))
        .execute(&pool)
        .await?;
    let reaped = db.jobs().reap().await?;
    assert_eq!(reaped, 1);
    assert!(db.jobs().get(job.id).await?.is_none());

    let stats = db.jobs().stats().await?;
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.succeeded, 0);
    Ok(())
}
