//! Dashboard aggregates: top groups, top solo artists, artist detail with
//! membership breakdown.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use waxwing_core::types::{ArtistId, UserId};

use crate::errors::{AppError, AppResult};
use crate::handlers::playback::ListingQuery;
use crate::infra::app_state::AppState;

const MAX_LISTING_LIMIT: i64 = 50;

pub async fn top_groups(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Json<Value>> {
    let limit = query.limit.unwrap_or(10).clamp(1, MAX_LISTING_LIMIT);
    let groups = state
        .db()
        .stats()
        .top_groups(UserId::from(user_id), limit)
        .await?;
    Ok(Json(json!({ "items": groups })))
}

pub async fn top_solo_artists(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Json<Value>> {
    let limit = query.limit.unwrap_or(10).clamp(1, MAX_LISTING_LIMIT);
    let artists = state
        .db()
        .stats()
        .top_solo_artists(UserId::from(user_id), limit)
        .await?;
    Ok(Json(json!({ "items": artists })))
}

/// Artist detail: groups are broken down into members, persons into the
/// groups they have played in. Stints are listed per relationship.
pub async fn artist_detail(
    State(state): State<AppState>,
    Path(artist_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let artist_id = ArtistId::from(artist_id);
    let artist = state
        .db()
        .catalog()
        .get_artist(artist_id)
        .await?
        .ok_or_else(|| AppError::not_found("artist not found"))?;

    let (members, groups) = if artist.is_group() {
        (state.db().stats().group_members(artist_id).await?, Vec::new())
    } else {
        (Vec::new(), state.db().stats().member_groups(artist_id).await?)
    };

    Ok(Json(json!({
        "artist": artist,
        "members": members,
        "groups": groups,
    })))
}
