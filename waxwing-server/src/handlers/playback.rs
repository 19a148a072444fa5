//! Playback read endpoints: currently-playing pass-through and the
//! scrobble history listing.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use waxwing_core::provider::PollOutcome;
use waxwing_core::types::{Provider, UserId};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

const MAX_LISTING_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(MAX_LISTING_LIMIT).clamp(1, MAX_LISTING_LIMIT)
}

/// Server-side pass-through of the provider's currently-playing view for
/// one user.
pub async fn currently_playing(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let user_id = UserId::from(user_id);
    let account = state
        .db()
        .accounts()
        .get_for_user(user_id, Provider::Spotify.as_str())
        .await?
        .ok_or_else(|| AppError::not_found("no linked account for user"))?;

    let token = state
        .tokens()
        .get_valid_access_token(state.db().accounts(), &account)
        .await?;
    let outcome = state.player().currently_playing(&token).await?;

    let body = match outcome {
        PollOutcome::NoContent => json!({ "playing": false, "track": null }),
        PollOutcome::NotATrack => json!({ "playing": false, "track": null }),
        PollOutcome::Track(snapshot) => json!({
            "playing": snapshot.is_playing,
            "progress_ms": snapshot.progress_ms,
            "track": snapshot.metadata,
        }),
    };
    Ok(Json(body))
}

pub async fn recently_played(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Json<Value>> {
    let limit = clamp_limit(query.limit);
    let plays = state
        .db()
        .stats()
        .recently_played(UserId::from(user_id), limit)
        .await?;
    let count = plays.len();
    Ok(Json(json!({ "items": plays, "count": count })))
}
