//! Canonical store contracts: idempotent upserts, external-id
//! back-attachment with its enrichment side effect, link rows, scrobble
//! dedupe keys, and cursor monotonicity.

use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;

use waxwing_core::model::catalog::{ArtistCredit, TrackMetadata};
use waxwing_core::model::job::{JobKind, JobStatus};
use waxwing_core::model::scrobble::NewScrobble;
use waxwing_core::store::CanonicalStore;

#[path = "support/mod.rs"]
mod support;

fn store(db: &waxwing_core::Database) -> CanonicalStore {
    CanonicalStore::new(db.catalog().clone(), db.jobs().clone())
}

fn harvest_moon() -> TrackMetadata {
    TrackMetadata {
        title: "Harvest Moon".to_string(),
        duration_ms: Some(303_000),
        mbid: None,
        isrc: Some("USRE19200001".to_string()),
        explicit: false,
        credits: vec![ArtistCredit {
            name: "Neil Young".to_string(),
            mbid: None,
            join_phrase: String::new(),
        }],
        album_title: Some("Harvest Moon".to_string()),
        album_mbid: None,
        album_release_date: None,
        album_image_url: Some("https://img.example/hm.jpg".to_string()),
    }
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn upsert_play_is_idempotent(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool.clone());
    let store = store(&db);

    let first = store.upsert_play(&harvest_moon()).await?;
    let second = store.upsert_play(&harvest_moon()).await?;

    assert_eq!(first.track.id, second.track.id);
    assert_eq!(
        first.album.as_ref().map(|a| a.id),
        second.album.as_ref().map(|a| a.id)
    );

    let tracks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
        .fetch_one(&pool)
        .await?;
    let artists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(&pool)
        .await?;
    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM track_artists")
        .fetch_one(&pool)
        .await?;
    assert_eq!((tracks, artists, links), (1, 1, 1));
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn track_round_trips_through_isrc(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let store = store(&db);

    let upserted = store.upsert_play(&harvest_moon()).await?;
    let found = db
        .catalog()
        .find_track_by_isrc("USRE19200001")
        .await?
        .expect("isrc lookup");
    assert_eq!(found.id, upserted.track.id);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn mbid_back_attach_enqueues_relationship_sync(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool.clone());
    let store = store(&db);

    // First observation: provider only, no external id.
    let bare = store.upsert_artist("Bonobo", None).await?;
    assert!(bare.mbid.is_none());

    // Later the resolver supplies an mbid for the same name.
    let identified = store
        .upsert_artist("Bonobo", Some("9a709693-b4f8-4da9-8cc1-038c911a61be"))
        .await?;
    assert_eq!(identified.id, bare.id);
    assert_eq!(
        identified.mbid.as_deref(),
        Some("9a709693-b4f8-4da9-8cc1-038c911a61be")
    );

    let job = db.jobs().claim_batch("worker-a", 1).await?.remove(0);
    assert_eq!(job.job_kind, JobKind::ArtistSyncRelationships);
    assert_eq!(job.entity_id, bare.id.as_uuid());
    assert_eq!(job.status, JobStatus::Running);

    // Re-upserting with the same mbid is a pure read.
    let again = store
        .upsert_artist("Bonobo", Some("9a709693-b4f8-4da9-8cc1-038c911a61be"))
        .await?;
    assert_eq!(again.id, bare.id);
    let artists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(&pool)
        .await?;
    assert_eq!(artists, 1);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn same_name_different_mbid_is_a_new_artist(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let store = store(&db);

    let first = store.upsert_artist("Clark", Some("mbid-clark-1")).await?;
    let second = store.upsert_artist("Clark", Some("mbid-clark-2")).await?;
    assert_ne!(first.id, second.id);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn duplicate_scrobble_insert_is_absorbed(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let store = store(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;

    let play = store.upsert_play(&harvest_moon()).await?;
    let played_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let scrobble = NewScrobble {
        user_id: account.user_id,
        track_id: play.track.id,
        album_id: play.album.as_ref().map(|a| a.id),
        played_at,
        played_duration_ms: 303_000,
        skipped: false,
        provider: "spotify".to_string(),
        import_batch_id: None,
    };

    assert!(db.scrobbles().insert(&scrobble).await?.is_some());
    // Same (user, track, played_at): silently absorbed.
    assert!(db.scrobbles().insert(&scrobble).await?.is_none());
    assert_eq!(db.scrobbles().count_for_user(account.user_id).await?, 1);
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn dedupe_windows_bracket_played_at(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let store = store(&db);
    let account = support::seed_account(&db, "listener@example.com").await?;

    let play = store.upsert_play(&harvest_moon()).await?;
    let started_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    db.scrobbles()
        .insert(&NewScrobble {
            user_id: account.user_id,
            track_id: play.track.id,
            album_id: None,
            played_at: started_at,
            played_duration_ms: 250_000,
            skipped: false,
            provider: "spotify".to_string(),
            import_batch_id: None,
        })
        .await?;

    // Session-engine bracket: ±5 s around started_at.
    assert!(
        db.scrobbles()
            .exists_near(account.user_id, "spotify", started_at + Duration::seconds(4),
                         Duration::seconds(5))
            .await?
    );
    assert!(
        !db.scrobbles()
            .exists_near(account.user_id, "spotify", started_at + Duration::seconds(20),
                         Duration::seconds(5))
            .await?
    );

    // Reconciler bracket: the same play observed 3m30s later (end-of-play
    // timestamp) still falls inside the ±10 min window.
    assert!(
        db.scrobbles()
            .exists_near_track(
                account.user_id,
                play.track.id,
                started_at + Duration::seconds(210),
                Duration::seconds(600)
            )
            .await?
    );
    assert!(
        !db.scrobbles()
            .exists_near_track(
                account.user_id,
                play.track.id,
                started_at + Duration::seconds(900),
                Duration::seconds(600)
            )
            .await?
    );
    Ok(())
}

#[sqlx::test(migrator = "waxwing_core::MIGRATOR")]
async fn cursor_only_moves_forward(pool: PgPool) -> anyhow::Result<()> {
    let db = support::database(pool);
    let account = support::seed_account(&db, "listener@example.com").await?;

    let t1 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let t2 = t1 + Duration::minutes(10);

    db.cursors().advance(account.user_id, "spotify", t2).await?;
    // A stale writer cannot move the cursor back.
    db.cursors().advance(account.user_id, "spotify", t1).await?;

    let cursor = db.cursors().get(account.user_id, "spotify").await?;
    assert_eq!(cursor, Some(t2));
    Ok(())
}
