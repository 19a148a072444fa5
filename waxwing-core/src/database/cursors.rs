use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::types::UserId;

/// Reconciler high-water mark per (user, provider). Only moves forward.
#[derive(Clone, Debug)]
pub struct CursorRepository {
    pool: PgPool,
}

impl CursorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let cursor: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT last_played_at FROM scrobble_cursors \
             WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cursor)
    }

    /// Monotonic advance: a stale caller can never move the cursor back.
    pub async fn advance(
        &self,
        user_id: UserId,
        provider: &str,
        played_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrobble_cursors (user_id, provider, last_played_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, provider) DO UPDATE
                SET last_played_at = GREATEST(scrobble_cursors.last_played_at,
                                              EXCLUDED.last_played_at),
                    updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(played_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
