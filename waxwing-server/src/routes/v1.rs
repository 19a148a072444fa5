use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{enrichment, health, playback, stats};
use crate::infra::app_state::AppState;

/// All v1 API routes.
pub fn create_v1_router(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // Playback read surface
        .route(
            "/api/v1/users/{user_id}/currently-playing",
            get(playback::currently_playing),
        )
        .route(
            "/api/v1/users/{user_id}/recently-played",
            get(playback::recently_played),
        )
        // Dashboard aggregates
        .route(
            "/api/v1/users/{user_id}/stats/top-groups",
            get(stats::top_groups),
        )
        .route(
            "/api/v1/users/{user_id}/stats/top-solo-artists",
            get(stats::top_solo_artists),
        )
        .route("/api/v1/artists/{artist_id}", get(stats::artist_detail))
        // Enrichment triggers
        .route("/api/v1/sync/artists", post(enrichment::sync_artists_bulk))
        .route(
            "/api/v1/sync/artists/{artist_id}",
            post(enrichment::sync_artist),
        )
        .route("/api/v1/sync/albums", post(enrichment::sync_albums_bulk))
        .route(
            "/api/v1/sync/albums/{album_id}",
            post(enrichment::sync_album),
        )
        .route("/api/v1/sync/tracks", post(enrichment::sync_tracks_bulk))
        .route(
            "/api/v1/sync/tracks/{track_id}",
            post(enrichment::sync_track),
        )
        // Queue observability
        .route("/api/v1/jobs", get(enrichment::queue_stats))
        .route("/api/v1/jobs/{job_id}", get(enrichment::get_job))
}
