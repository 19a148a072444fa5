use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::UserId;

/// Persisted playback state for one (user, provider). Exactly one row;
/// clearing the row is the only way to reset the state machine.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PlaybackSession {
    pub user_id: UserId,
    pub provider: String,
    pub track_uri: String,
    /// When this play instance began.
    pub started_at: DateTime<Utc>,
    /// Last successful poll.
    pub last_seen_at: DateTime<Utc>,
    /// Provider-reported position at the last poll.
    pub last_progress_ms: i64,
    pub accumulated_ms: i64,
    pub is_playing: bool,
    pub track_duration_ms: Option<i64>,
    /// Raw provider metadata captured when the session began. Finalization
    /// must never re-query the provider for a track that already left the
    /// currently-playing endpoint.
    pub track_metadata: Option<serde_json::Value>,
    pub scrobbled: bool,
}

impl PlaybackSession {
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after_ms: i64) -> bool {
        now - self.last_seen_at >= Duration::milliseconds(stale_after_ms)
    }
}
