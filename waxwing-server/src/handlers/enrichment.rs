//! Enrichment trigger endpoints. Sync requests are asynchronous by design:
//! every accepted request answers 202 with a job id, and clients poll
//! `jobs/{id}` until the status is terminal.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use waxwing_core::model::job::JobKind;
use waxwing_core::types::{AlbumId, ArtistId, JobId, TrackId};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

const MAX_BULK_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    #[default]
    Sync,
    Resolve,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    #[serde(rename = "type", default)]
    pub sync_type: SyncType,
    pub limit: Option<i64>,
}

pub async fn sync_artist(
    State(state): State<AppState>,
    Path(artist_id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = ArtistId::from(artist_id);
    let artist = state
        .db()
        .catalog()
        .get_artist(id)
        .await?
        .ok_or_else(|| AppError::not_found("artist not found"))?;

    let kind = match query.sync_type {
        SyncType::Resolve => JobKind::ArtistResolveMbid,
        SyncType::Sync => {
            if artist.mbid.is_none() {
                return Err(AppError::bad_request("artist has no mbid"));
            }
            JobKind::ArtistSyncRelationships
        }
    };

    let outcome = state.db().jobs().enqueue(kind, artist_id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!(outcome))))
}

pub async fn sync_album(
    State(state): State<AppState>,
    Path(album_id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = AlbumId::from(album_id);
    let album = state
        .db()
        .catalog()
        .get_album(id)
        .await?
        .ok_or_else(|| AppError::not_found("album not found"))?;

    let kind = match query.sync_type {
        SyncType::Resolve => JobKind::AlbumResolveMbid,
        SyncType::Sync => {
            if album.mbid.is_none() {
                return Err(AppError::bad_request("album has no mbid"));
            }
            JobKind::AlbumSync
        }
    };

    let outcome = state.db().jobs().enqueue(kind, album_id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!(outcome))))
}

pub async fn sync_track(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = TrackId::from(track_id);
    let track = state
        .db()
        .catalog()
        .get_track(id)
        .await?
        .ok_or_else(|| AppError::not_found("track not found"))?;

    let kind = match query.sync_type {
        SyncType::Resolve => JobKind::TrackResolveMbid,
        SyncType::Sync => {
            if track.mbid.is_none() {
                return Err(AppError::bad_request("track has no mbid"));
            }
            JobKind::TrackSync
        }
    };

    let outcome = state.db().jobs().enqueue(kind, track_id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!(outcome))))
}

pub async fn sync_artists_bulk(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let limit = query.limit.unwrap_or(MAX_BULK_LIMIT).clamp(1, MAX_BULK_LIMIT);
    let (kind, candidates) = match query.sync_type {
        SyncType::Resolve => (
            JobKind::ArtistResolveMbid,
            state
                .db()
                .catalog()
                .artists_missing_mbid(limit)
                .await?
                .into_iter()
                .map(|a| a.id.as_uuid())
                .collect::<Vec<_>>(),
        ),
        SyncType::Sync => (
            JobKind::ArtistSyncRelationships,
            state
                .db()
                .catalog()
                .artists_for_sync(limit)
                .await?
                .into_iter()
                .map(|a| a.id.as_uuid())
                .collect::<Vec<_>>(),
        ),
    };
    enqueue_bulk(&state, kind, candidates).await
}

pub async fn sync_albums_bulk(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let limit = query.limit.unwrap_or(MAX_BULK_LIMIT).clamp(1, MAX_BULK_LIMIT);
    let (kind, candidates) = match query.sync_type {
        SyncType::Resolve => (
            JobKind::AlbumResolveMbid,
            state
                .db()
                .catalog()
                .albums_missing_mbid(limit)
                .await?
                .into_iter()
                .map(|a| a.id.as_uuid())
                .collect::<Vec<_>>(),
        ),
        SyncType::Sync => (
            JobKind::AlbumSync,
            state
                .db()
                .catalog()
                .albums_for_sync(limit)
                .await?
                .into_iter()
                .map(|a| a.id.as_uuid())
                .collect::<Vec<_>>(),
        ),
    };
    enqueue_bulk(&state, kind, candidates).await
}

pub async fn sync_tracks_bulk(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let limit = query.limit.unwrap_or(MAX_BULK_LIMIT).clamp(1, MAX_BULK_LIMIT);
    let (kind, candidates) = match query.sync_type {
        SyncType::Resolve => (
            JobKind::TrackResolveMbid,
            state
                .db()
                .catalog()
                .tracks_missing_mbid(limit)
                .await?
                .into_iter()
                .map(|t| t.id.as_uuid())
                .collect::<Vec<_>>(),
        ),
        SyncType::Sync => (
            JobKind::TrackSync,
            state
                .db()
                .catalog()
                .tracks_for_sync(limit)
                .await?
                .into_iter()
                .map(|t| t.id.as_uuid())
                .collect::<Vec<_>>(),
        ),
    };
    enqueue_bulk(&state, kind, candidates).await
}

async fn enqueue_bulk(
    state: &AppState,
    kind: JobKind,
    entity_ids: Vec<Uuid>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let mut outcomes = Vec::with_capacity(entity_ids.len());
    for entity_id in entity_ids {
        outcomes.push(state.db().jobs().enqueue(kind, entity_id).await?);
    }
    let count = outcomes.len();
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "jobs": outcomes, "count": count })),
    ))
}

pub async fn queue_stats(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let stats = state.db().jobs().stats().await?;
    Ok(Json(json!(stats)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let job = state
        .db()
        .jobs()
        .get(JobId::from(job_id))
        .await?
        .ok_or_else(|| AppError::not_found("job not found"))?;
    Ok(Json(json!(job)))
}
