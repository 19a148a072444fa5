//! End-to-end tests for the playback session state machine, driven with
//! synthetic poll snapshots. The metadata service is pointed at an
//! unreachable address with a single attempt, so canonicalization falls
//! back to provider metadata instead of touching the network for long.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use waxwing_core::config::{MusicBrainzConfig, PlaybackConfig, SpotifyConfig};
use waxwing_core::coverart::CoverArtClient;
use waxwing_core::model::PlaybackSession;
use waxwing_core::musicbrainz::MusicBrainzClient;
use waxwing_core::playback::SessionEngine;
use waxwing_core::provider::dto::{ArtistObject, TrackObject};
use waxwing_core::provider::{PlayerClient, PollOutcome, TokenClient, TrackSnapshot};
use waxwing_core::resolver::MetadataResolver;
use waxwing_core::store::CanonicalStore;
use waxwing_core::Database;

#[path = "support/mod.rs"]
mod support;

fn offline_musicbrainz_config() -> MusicBrainzConfig {
    MusicBrainzConfig {
        user_agent: "waxwing-tests/0.1 (test@waxwing.example)".to_string(),
        base_url: "http://127.0.0.1:1/ws/2".to_string(),
        cover_art_base_url: "http://127.0.0.1:1".to_string(),
        min_request_interval_ms: 0,
        max_attempts: 1,
        ..MusicBrainzConfig::default()
    }
}

fn engine(db: &Database) -> SessionEngine {
    let mb_config = offline_musicbrainz_config();
    let spotify_config = SpotifyConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        ..SpotifyConfig::default()
    };
    let resolver = Arc::new(MetadataResolver::new(
        MusicBrainzClient::new(mb_config.clone()).unwrap(),
        CoverArtClient::new(&mb_config).unwrap(),
    ));
    SessionEngine::new(
        PlaybackConfig::default(),
        db.accounts().clone(),
        db.sessions().clone(),
        db.scrobbles().clone(),
        CanonicalStore::new(db.catalog().clone(), db.jobs().clone()),
        resolver,
        PlayerClient::new(&spotify_config).unwrap(),
        Arc::new(TokenClient::new(spotify_config).unwrap()),
    )
}

fn track(uri: &str, name: &str, duration_ms: i64) -> TrackObject {
    TrackObject {
        id: Some(uri.rsplit(':').next().unwrap().to_string()),
        uri: uri.to_string(),
        name: name.to_string(),
        duration_ms,
        explicit: false,
        artists: vec![ArtistObject {
            id: None,
            name: "Ott".to_string(),
        }],
        album: None,
        external_ids: None,
    }
}

fn snapshot(
    track: &TrackObject,
    progress_ms: i64,
    is_playing: bool,
    observed_at: DateTime<Utc>,
) -> PollOutcome {
    PollOutcome::Track(TrackSnapshot {
        uri: track.uri.clone(),
        progress_ms,
        is_playing,
        duration_ms: Some(track.duration_ms),
        track: track.clone(),
        metadata: serde_json::to_value(track).unwrap(),
        observed_at,
    })
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn first_poll_creates_a_fresh_session(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;

    let t = track("spotify:track:one", "Roflcopter", 200_000);
    let now = Utc::now();
    engine
        .apply_poll(account.user_id, "spotify", snapshot(&t, 12_000, true, now))
        .await?;

    let session = db
        .sessions()
        .get(account.user_id, "spotify")
        .await?
        .expect("session row");
    assert_eq!(session.track_uri, "spotify:track:one");
    assert_eq!(session.accumulated_ms, 0);
    assert_eq!(session.last_progress_ms, 12_000);
    assert!(!session.scrobbled);
    assert!(session.track_metadata.is_some());
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn pause_and_resume_accumulate_exactly_once(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let t = track("spotify:track:one", "Roflcopter", 200_000);
    let start = Utc::now();
    let poll = |p: i64, playing: bool, secs: i64| snapshot(&t, p, playing, start + Duration::seconds(secs));

    engine.apply_poll(user, "spotify", poll(10_000, true, 0)).await?;
    // Playing -> +8s, then the provider reports paused.
    engine.apply_poll(user, "spotify", poll(18_000, false, 8)).await?;
    // Paused, no movement.
    engine.apply_poll(user, "spotify", poll(18_000, false, 16)).await?;
    // Resumed, but the *previous* poll was paused: position only.
    engine.apply_poll(user, "spotify", poll(18_000, true, 24)).await?;
    // Now playing again: +8s.
    engine.apply_poll(user, "spotify", poll(26_000, true, 32)).await?;

    let session = db.sessions().get(user, "spotify").await?.expect("session");
    assert_eq!(session.accumulated_ms, 16_000);
    assert!(session.is_playing);
    assert_eq!(session.last_progress_ms, 26_000);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn track_change_finalizes_previous_play(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let first = track("spotify:track:one", "Roflcopter", 200_000);
    let start = Utc::now();
    let mut at = 0i64;
    let mut progress = 0i64;
    // Five polls of forward progress: 40s accumulated, past the 30s floor.
    for _ in 0..5 {
        at += 8;
        progress += 8_000;
        engine
            .apply_poll(
                user,
                "spotify",
                snapshot(&first, progress, true, start + Duration::seconds(at)),
            )
            .await?;
    }

    let second = track("spotify:track:two", "Owl Stretching", 180_000);
    engine
        .apply_poll(
            user,
            "spotify",
            snapshot(&second, 2_000, true, start + Duration::seconds(at + 8)),
        )
        .await?;

    assert_eq!(db.scrobbles().count_for_user(user).await?, 1);
    let scrobbled = db
        .catalog()
        .find_track_by_title_and_artist("Roflcopter", "Ott")
        .await?;
    assert!(scrobbled.is_some());

    let session = db.sessions().get(user, "spotify").await?.expect("session");
    assert_eq!(session.track_uri, "spotify:track:two");
    assert_eq!(session.accumulated_ms, 0);
    assert!(!session.scrobbled);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn short_play_is_dropped_on_track_change(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let first = track("spotify:track:one", "Roflcopter", 200_000);
    let start = Utc::now();
    engine
        .apply_poll(user, "spotify", snapshot(&first, 0, true, start))
        .await?;
    engine
        .apply_poll(
            user,
            "spotify",
            snapshot(&first, 8_000, true, start + Duration::seconds(8)),
        )
        .await?;

    let second = track("spotify:track:two", "Owl Stretching", 180_000);
    engine
        .apply_poll(
            user,
            "spotify",
            snapshot(&second, 0, true, start + Duration::seconds(16)),
        )
        .await?;

    // 8s of a 200s track fails both threshold arms.
    assert_eq!(db.scrobbles().count_for_user(user).await?, 0);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn wrap_finalizes_one_full_play_and_restarts(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let t = track("spotify:track:one", "Roflcopter", 200_000);
    let start = Utc::now();
    // First sighting at position zero.
    engine
        .apply_poll(user, "spotify", snapshot(&t, 0, true, start))
        .await?;
    let mut at = 0i64;
    let mut progress = 0i64;
    // Forward progress to 180s (deltas stay under the seek cap).
    for _ in 0..6 {
        at += 30;
        progress += 30_000;
        engine
            .apply_poll(
                user,
                "spotify",
                snapshot(&t, progress, true, start + Duration::seconds(at)),
            )
            .await?;
    }

    // The track restarts: 180s -> 5s is far past the wrap threshold (70s).
    engine
        .apply_poll(
            user,
            "spotify",
            snapshot(&t, 5_000, true, start + Duration::seconds(at + 30)),
        )
        .await?;

    assert_eq!(db.scrobbles().count_for_user(user).await?, 1);
    let full_play: (i64, bool) = sqlx::query_as(
        "SELECT played_duration_ms, skipped FROM scrobbles WHERE user_id = $1",
    )
    .bind(user)
    .fetch_one(db.pool())
    .await?;
    // 180s of a 200s track: short of the end margin, but exactly at the
    // 90% skip threshold, so the play counts as a full listen.
    assert_eq!(full_play, (180_000, false));

    let session = db.sessions().get(user, "spotify").await?.expect("session");
    assert_eq!(session.track_uri, "spotify:track:one");
    assert_eq!(session.accumulated_ms, 0);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn stale_session_finalizes_on_empty_poll(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let t = track("spotify:track:one", "Roflcopter", 200_000);
    let started_at = Utc::now() - Duration::minutes(45);
    db.sessions()
        .save(&PlaybackSession {
            user_id: user,
            provider: "spotify".to_string(),
            track_uri: t.uri.clone(),
            started_at,
            last_seen_at: Utc::now() - Duration::minutes(40),
            last_progress_ms: 190_000,
            accumulated_ms: 190_000,
            is_playing: false,
            track_duration_ms: Some(200_000),
            track_metadata: Some(serde_json::to_value(&t)?),
            scrobbled: false,
        })
        .await?;

    // Fresh empty poll: session is idle far past the staleness cutoff.
    engine
        .apply_poll(user, "spotify", PollOutcome::NoContent)
        .await?;

    assert_eq!(db.scrobbles().count_for_user(user).await?, 1);
    assert!(db.sessions().get(user, "spotify").await?.is_none());
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn idle_but_not_stale_session_is_kept(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let t = track("spotify:track:one", "Roflcopter", 200_000);
    engine
        .apply_poll(user, "spotify", snapshot(&t, 60_000, false, Utc::now()))
        .await?;
    engine
        .apply_poll(user, "spotify", PollOutcome::NoContent)
        .await?;

    // The listener may resume; nothing is finalized yet.
    assert!(db.sessions().get(user, "spotify").await?.is_some());
    assert_eq!(db.scrobbles().count_for_user(user).await?, 0);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn refinalizing_the_same_play_window_is_deduped(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let engine = engine(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;
    let user = account.user_id;

    let t = track("spotify:track:one", "Roflcopter", 200_000);
    let started_at = Utc::now() - Duration::minutes(45);
    let session = PlaybackSession {
        user_id: user,
        provider: "spotify".to_string(),
        track_uri: t.uri.clone(),
        started_at,
        last_seen_at: Utc::now() - Duration::minutes(40),
        last_progress_ms: 190_000,
        accumulated_ms: 190_000,
        is_playing: false,
        track_duration_ms: Some(200_000),
        track_metadata: Some(serde_json::to_value(&t)?),
        scrobbled: false,
    };

    db.sessions().save(&session).await?;
    engine.apply_poll(user, "spotify", PollOutcome::NoContent).await?;

    // The same play instance reappears (e.g. a replayed poll after a crash
    // restored the row): the started_at bracket suppresses a second row.
    db.sessions().save(&session).await?;
    engine.apply_poll(user, "spotify", PollOutcome::NoContent).await?;

    assert_eq!(db.scrobbles().count_for_user(user).await?, 1);
    Ok(())
}
