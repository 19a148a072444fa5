use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{AlbumId, ScrobbleId, TrackId, UserId};

/// One recorded play, uniquely keyed by (user, track, played_at).
///
/// `played_at` semantics differ by ingestion path: the session engine writes
/// the session start, the reconciler writes the provider-reported end of the
/// play. The dedupe windows account for the difference.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Scrobble {
    pub id: ScrobbleId,
    pub user_id: UserId,
    pub track_id: TrackId,
    pub album_id: Option<AlbumId>,
    pub played_at: DateTime<Utc>,
    pub played_duration_ms: i64,
    pub skipped: bool,
    pub provider: String,
    pub import_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A scrobble candidate ready for insertion.
#[derive(Clone, Debug)]
pub struct NewScrobble {
    pub user_id: UserId,
    pub track_id: TrackId,
    pub album_id: Option<AlbumId>,
    pub played_at: DateTime<Utc>,
    pub played_duration_ms: i64,
    pub skipped: bool,
    pub provider: String,
    pub import_batch_id: Option<Uuid>,
}
