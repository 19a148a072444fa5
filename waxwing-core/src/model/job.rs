use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::types::JobId;

/// The enrichment operations the worker knows how to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum JobKind {
    ArtistResolveMbid,
    ArtistSyncRelationships,
    AlbumResolveMbid,
    AlbumSync,
    TrackResolveMbid,
    TrackSync,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ArtistResolveMbid => "artist.resolve_mbid",
            JobKind::ArtistSyncRelationships => "artist.sync_relationships",
            JobKind::AlbumResolveMbid => "album.resolve_mbid",
            JobKind::AlbumSync => "album.sync",
            JobKind::TrackResolveMbid => "track.resolve_mbid",
            JobKind::TrackSync => "track.sync",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "artist.resolve_mbid" => Ok(JobKind::ArtistResolveMbid),
            "artist.sync_relationships" => Ok(JobKind::ArtistSyncRelationships),
            "album.resolve_mbid" => Ok(JobKind::AlbumResolveMbid),
            "album.sync" => Ok(JobKind::AlbumSync),
            "track.resolve_mbid" => Ok(JobKind::TrackResolveMbid),
            "track.sync" => Ok(JobKind::TrackSync),
            other => Err(CoreError::Internal(format!("unknown job kind: {other}"))),
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            JobKind::ArtistResolveMbid | JobKind::ArtistSyncRelationships => EntityKind::Artist,
            JobKind::AlbumResolveMbid | JobKind::AlbumSync => EntityKind::Album,
            JobKind::TrackResolveMbid | JobKind::TrackSync => EntityKind::Track,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artist,
    Album,
    Track,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Track => "track",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "artist" => Ok(EntityKind::Artist),
            "album" => Ok(EntityKind::Album),
            "track" => Ok(EntityKind::Track),
            other => Err(CoreError::Internal(format!("unknown entity kind: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Internal(format!("unknown job status: {other}"))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct EnrichmentJob {
    pub id: JobId,
    pub job_kind: JobKind,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_after: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an enqueue attempt. When an active job for the same
/// (kind, entity) already exists, its id is returned instead of a new row.
#[derive(Clone, Debug, Serialize)]
pub struct EnqueueOutcome {
    pub job_id: JobId,
    pub created: bool,
    pub reason: Option<&'static str>,
}

impl EnqueueOutcome {
    pub fn created(job_id: JobId) -> Self {
        Self {
            job_id,
            created: true,
            reason: None,
        }
    }

    pub fn already_active(job_id: JobId) -> Self {
        Self {
            job_id,
            created: false,
            reason: Some("already_active"),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub succeeded: i64,
    pub failed: i64,
}
