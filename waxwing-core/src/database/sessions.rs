use sqlx::PgPool;

use crate::error::Result;
use crate::model::PlaybackSession;
use crate::types::UserId;

const COLUMNS: &str = "user_id, provider, track_uri, started_at, last_seen_at, \
     last_progress_ms, accumulated_ms, is_playing, track_duration_ms, \
     track_metadata, scrobbled";

/// One row per (user, provider); the whole row is written on every poll.
#[derive(Clone, Debug)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<PlaybackSession>> {
        let session = sqlx::query_as::<_, PlaybackSession>(&format!(
            "SELECT {COLUMNS} FROM playback_sessions WHERE user_id = $1 AND provider = $2"
        ))
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<PlaybackSession>> {
        let sessions = sqlx::query_as::<_, PlaybackSession>(&format!(
            "SELECT {COLUMNS} FROM playback_sessions WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn save(&self, session: &PlaybackSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO playback_sessions
                (user_id, provider, track_uri, started_at, last_seen_at,
                 last_progress_ms, accumulated_ms, is_playing, track_duration_ms,
                 track_metadata, scrobbled)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id, provider) DO UPDATE
                SET track_uri = EXCLUDED.track_uri,
                    started_at = EXCLUDED.started_at,
                    last_seen_at = EXCLUDED.last_seen_at,
                    last_progress_ms = EXCLUDED.last_progress_ms,
                    accumulated_ms = EXCLUDED.accumulated_ms,
                    is_playing = EXCLUDED.is_playing,
                    track_duration_ms = EXCLUDED.track_duration_ms,
                    track_metadata = EXCLUDED.track_metadata,
                    scrobbled = EXCLUDED.scrobbled
            "#,
        )
        .bind(session.user_id)
        .bind(&session.provider)
        .bind(&session.track_uri)
        .bind(session.started_at)
        .bind(session.last_seen_at)
        .bind(session.last_progress_ms)
        .bind(session.accumulated_ms)
        .bind(session.is_playing)
        .bind(session.track_duration_ms)
        .bind(&session.track_metadata)
        .bind(session.scrobbled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_scrobbled(&self, user_id: UserId, provider: &str) -> Result<()> {
        sqlx::query(
            "UPDATE playback_sessions SET scrobbled = true \
             WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clearing the row is the only way to reset the state machine.
    pub async fn delete(&self, user_id: UserId, provider: &str) -> Result<()> {
        sqlx::query("DELETE FROM playback_sessions WHERE user_id = $1 AND provider = $2")
            .bind(user_id)
            .bind(provider)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
