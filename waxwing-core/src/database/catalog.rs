//! Canonical catalog persistence: artists, albums, tracks, and links.
//!
//! The upsert contracts (match by external id first, then by natural key,
//! back-attach the external id when it shows up later) live in
//! `crate::store`; this module is the raw SQL beneath them.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::model::catalog::{Album, Artist, ArtistType, Track};
use crate::types::{AlbumId, ArtistId, TrackId};

#[derive(sqlx::FromRow)]
struct ArtistRow {
    id: ArtistId,
    name: String,
    mbid: Option<String>,
    artist_type: Option<String>,
    gender: Option<String>,
    begin_date_raw: Option<String>,
    end_date_raw: Option<String>,
    image_url: Option<String>,
    last_enriched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArtistRow> for Artist {
    fn from(row: ArtistRow) -> Self {
        Artist {
            id: row.id,
            name: row.name,
            mbid: row.mbid,
            artist_type: row.artist_type.as_deref().and_then(ArtistType::parse),
            gender: row.gender,
            begin_date_raw: row.begin_date_raw,
            end_date_raw: row.end_date_raw,
            image_url: row.image_url,
            last_enriched_at: row.last_enriched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ARTIST_COLUMNS: &str = "id, name, mbid, artist_type, gender, begin_date_raw, \
     end_date_raw, image_url, last_enriched_at, created_at, updated_at";

const ALBUM_COLUMNS: &str = "id, artist_id, title, release_date, mbid, image_url, \
     last_enriched_at, created_at, updated_at";

const TRACK_COLUMNS: &str = "id, title, duration_ms, mbid, isrc, explicit, \
     last_enriched_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----- artists -----

    pub async fn get_artist(&self, id: ArtistId) -> Result<Option<Artist>> {
        let row = sqlx::query_as::<_, ArtistRow>(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Artist::from))
    }

    pub async fn find_artist_by_mbid(&self, mbid: &str) -> Result<Option<Artist>> {
        let row = sqlx::query_as::<_, ArtistRow>(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists WHERE mbid = $1"
        ))
        .bind(mbid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Artist::from))
    }

    /// Exact-name match, preferring rows that are not yet pinned to another
    /// external id. Oldest row wins so repeated observations converge.
    pub async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let row = sqlx::query_as::<_, ArtistRow>(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists WHERE name = $1 \
             ORDER BY (mbid IS NOT NULL), created_at LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Artist::from))
    }

    pub async fn insert_artist(&self, name: &str, mbid: Option<&str>) -> Result<Artist> {
        let row = sqlx::query_as::<_, ArtistRow>(&format!(
            "INSERT INTO artists (name, mbid) VALUES ($1, $2) RETURNING {ARTIST_COLUMNS}"
        ))
        .bind(name)
        .bind(mbid)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn attach_artist_mbid(&self, id: ArtistId, mbid: &str) -> Result<()> {
        sqlx::query(
            "UPDATE artists SET mbid = $2, updated_at = now() WHERE id = $1 AND mbid IS NULL",
        )
        .bind(id)
        .bind(mbid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_artist_details(
        &self,
        id: ArtistId,
        artist_type: Option<ArtistType>,
        gender: Option<&str>,
        begin_date_raw: Option<&str>,
        end_date_raw: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE artists
            SET artist_type = COALESCE($2, artist_type),
                gender = COALESCE($3, gender),
                begin_date_raw = COALESCE($4, begin_date_raw),
                end_date_raw = COALESCE($5, end_date_raw),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(artist_type.map(|t| t.as_str()))
        .bind(gender)
        .bind(begin_date_raw)
        .bind(end_date_raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ----- albums -----

    pub async fn get_album(&self, id: AlbumId) -> Result<Option<Album>> {
        let album = sqlx::query_as::<_, Album>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(album)
    }

    pub async fn find_album_by_mbid(&self, mbid: &str) -> Result<Option<Album>> {
        let album = sqlx::query_as::<_, Album>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE mbid = $1"
        ))
        .bind(mbid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(album)
    }

    pub async fn find_album_by_title(
        &self,
        title: &str,
        artist_id: ArtistId,
    ) -> Result<Option<Album>> {
        let album = sqlx::query_as::<_, Album>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums \
             WHERE artist_id = $1 AND title = $2 \
             ORDER BY (mbid IS NOT NULL), created_at LIMIT 1"
        ))
        .bind(artist_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(album)
    }

    pub async fn insert_album(
        &self,
        artist_id: ArtistId,
        title: &str,
        mbid: Option<&str>,
        release_date: Option<NaiveDate>,
        image_url: Option<&str>,
    ) -> Result<Album> {
        let album = sqlx::query_as::<_, Album>(&format!(
            "INSERT INTO albums (artist_id, title, mbid, release_date, image_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ALBUM_COLUMNS}"
        ))
        .bind(artist_id)
        .bind(title)
        .bind(mbid)
        .bind(release_date)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(album)
    }

    pub async fn attach_album_mbid(&self, id: AlbumId, mbid: &str) -> Result<()> {
        sqlx::query(
            "UPDATE albums SET mbid = $2, updated_at = now() WHERE id = $1 AND mbid IS NULL",
        )
        .bind(id)
        .bind(mbid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_album_sync(
        &self,
        id: AlbumId,
        title: &str,
        release_date: Option<NaiveDate>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE albums
            SET title = $2,
                release_date = COALESCE($3, release_date),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(release_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_album_image(&self, id: AlbumId, image_url: &str) -> Result<()> {
        sqlx::query(
            "UPDATE albums SET image_url = $2, updated_at = now() \
             WHERE id = $1 AND image_url IS NULL",
        )
        .bind(id)
        .bind(image_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ----- tracks -----

    pub async fn get_track(&self, id: TrackId) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(track)
    }

    pub async fn find_track_by_isrc(&self, isrc: &str) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE isrc = $1"
        ))
        .bind(isrc)
        .fetch_optional(&self.pool)
        .await?;
        Ok(track)
    }

    pub async fn find_track_by_mbid(&self, mbid: &str) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE mbid = $1"
        ))
        .bind(mbid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(track)
    }

    /// Last-resort natural-key match for tracks the provider reports without
    /// an ISRC: same title, credited to the same primary artist.
    pub async fn find_track_by_title_and_artist(
        &self,
        title: &str,
        artist_name: &str,
    ) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(
            r#"
            SELECT t.id, t.title, t.duration_ms, t.mbid, t.isrc, t.explicit,
                   t.last_enriched_at, t.created_at, t.updated_at
            FROM tracks t
            JOIN track_artists ta ON ta.track_id = t.id AND ta.is_primary
            JOIN artists a ON a.id = ta.artist_id
            WHERE t.title = $1 AND a.name = $2
            ORDER BY t.created_at
            LIMIT 1
            "#,
        )
        .bind(title)
        .bind(artist_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(track)
    }

    pub async fn insert_track(
        &self,
        title: &str,
        duration_ms: Option<i64>,
        mbid: Option<&str>,
        isrc: Option<&str>,
        explicit: bool,
    ) -> Result<Track> {
        let track = sqlx::query_as::<_, Track>(&format!(
            "INSERT INTO tracks (title, duration_ms, mbid, isrc, explicit) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TRACK_COLUMNS}"
        ))
        .bind(title)
        .bind(duration_ms)
        .bind(mbid)
        .bind(isrc)
        .bind(explicit)
        .fetch_one(&self.pool)
        .await?;
        Ok(track)
    }

    pub async fn attach_track_mbid(&self, id: TrackId, mbid: &str) -> Result<()> {
        sqlx::query(
            "UPDATE tracks SET mbid = $2, updated_at = now() WHERE id = $1 AND mbid IS NULL",
        )
        .bind(id)
        .bind(mbid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_track_sync(
        &self,
        id: TrackId,
        title: &str,
        duration_ms: Option<i64>,
        isrc: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tracks
            SET title = $2,
                duration_ms = COALESCE($3, duration_ms),
                isrc = COALESCE(isrc, $4),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(duration_ms)
        .bind(isrc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ----- links -----

    pub async fn link_track_artist(
        &self,
        track_id: TrackId,
        artist_id: ArtistId,
        is_primary: bool,
        position: i32,
        join_phrase: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO track_artists (track_id, artist_id, is_primary, position, join_phrase)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (track_id, artist_id) DO NOTHING
            "#,
        )
        .bind(track_id)
        .bind(artist_id)
        .bind(is_primary)
        .bind(position)
        .bind(join_phrase)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn link_track_album(
        &self,
        track_id: TrackId,
        album_id: AlbumId,
        disc_number: Option<i32>,
        position: Option<i32>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO track_albums (track_id, album_id, disc_number, position)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (track_id, album_id) DO NOTHING
            "#,
        )
        .bind(track_id)
        .bind(album_id)
        .bind(disc_number)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ----- bulk-sync candidate listings -----

    pub async fn artists_missing_mbid(&self, limit: i64) -> Result<Vec<Artist>> {
        let rows = sqlx::query_as::<_, ArtistRow>(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists WHERE mbid IS NULL \
             ORDER BY created_at LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Artist::from).collect())
    }

    pub async fn artists_for_sync(&self, limit: i64) -> Result<Vec<Artist>> {
        let rows = sqlx::query_as::<_, ArtistRow>(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists WHERE mbid IS NOT NULL \
             ORDER BY last_enriched_at ASC NULLS FIRST LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Artist::from).collect())
    }

    pub async fn albums_missing_mbid(&self, limit: i64) -> Result<Vec<Album>> {
        let albums = sqlx::query_as::<_, Album>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE mbid IS NULL \
             ORDER BY created_at LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(albums)
    }

    pub async fn albums_for_sync(&self, limit: i64) -> Result<Vec<Album>> {
        let albums = sqlx::query_as::<_, Album>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE mbid IS NOT NULL \
             ORDER BY last_enriched_at ASC NULLS FIRST LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(albums)
    }

    pub async fn tracks_missing_mbid(&self, limit: i64) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE mbid IS NULL \
             ORDER BY created_at LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tracks)
    }

    pub async fn tracks_for_sync(&self, limit: i64) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE mbid IS NOT NULL \
             ORDER BY last_enriched_at ASC NULLS FIRST LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tracks)
    }

    /// Primary artist credited on a track, used to build search queries.
    pub async fn primary_artist_for_track(&self, track_id: TrackId) -> Result<Option<Artist>> {
        let row = sqlx::query_as::<_, ArtistRow>(
            r#"
            SELECT a.id, a.name, a.mbid, a.artist_type, a.gender, a.begin_date_raw,
                   a.end_date_raw, a.image_url, a.last_enriched_at, a.created_at, a.updated_at
            FROM artists a
            JOIN track_artists ta ON ta.artist_id = a.id
            WHERE ta.track_id = $1
            ORDER BY ta.is_primary DESC, ta.position
            LIMIT 1
            "#,
        )
        .bind(track_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Artist::from))
    }
}
