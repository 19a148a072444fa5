use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::model::scrobble::{NewScrobble, Scrobble};
use crate::types::{TrackId, UserId};

const COLUMNS: &str = "id, user_id, track_id, album_id, played_at, played_duration_ms, \
     skipped, provider, import_batch_id, created_at";

#[derive(Clone, Debug)]
pub struct ScrobbleRepository {
    pool: PgPool,
}

impl ScrobbleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a scrobble. A conflict on (user, track, played_at) is the
    /// dedupe key doing its job and is absorbed silently; `None` means the
    /// row already existed.
    pub async fn insert(&self, scrobble: &NewScrobble) -> Result<Option<Scrobble>> {
        let inserted = sqlx::query_as::<_, Scrobble>(&format!(
            "INSERT INTO scrobbles \
                 (user_id, track_id, album_id, played_at, played_duration_ms, \
                  skipped, provider, import_batch_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id, track_id, played_at) DO NOTHING \
             RETURNING {COLUMNS}"
        ))
        .bind(scrobble.user_id)
        .bind(scrobble.track_id)
        .bind(scrobble.album_id)
        .bind(scrobble.played_at)
        .bind(scrobble.played_duration_ms)
        .bind(scrobble.skipped)
        .bind(&scrobble.provider)
        .bind(scrobble.import_batch_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted)
    }

    /// Session-engine dedupe: any scrobble from this provider whose
    /// played_at falls within ±`half_width` of `center`. Guards against
    /// double-finalizing one play instance across pause/resume.
    pub async fn exists_near(
        &self,
        user_id: UserId,
        provider: &str,
        center: DateTime<Utc>,
        half_width: Duration,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM scrobbles
                WHERE user_id = $1 AND provider = $2
                  AND played_at BETWEEN $3 AND $4
            )
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(center - half_width)
        .bind(center + half_width)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Reconciler dedupe: same (user, track) within the wide window. The
    /// width absorbs the start-vs-end played_at semantics of the two
    /// ingestion paths.
    pub async fn exists_near_track(
        &self,
        user_id: UserId,
        track_id: TrackId,
        center: DateTime<Utc>,
        half_width: Duration,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM scrobbles
                WHERE user_id = $1 AND track_id = $2
                  AND played_at BETWEEN $3 AND $4
            )
            "#,
        )
        .bind(user_id)
        .bind(track_id)
        .bind(center - half_width)
        .bind(center + half_width)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn count_for_user(&self, user_id: UserId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scrobbles WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
