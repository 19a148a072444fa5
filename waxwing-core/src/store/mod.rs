//! Canonical store: idempotent upsert-and-link on top of the catalog
//! repository. Entities match by external id first, then by natural key;
//! an external id discovered later is attached to the existing row.
//!
//! Side effect: attaching an artist mbid enqueues a relationships sync so
//! group/member edges follow the identification.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::database::{CatalogRepository, JobQueue};
use crate::error::Result;
use crate::model::catalog::{Album, Artist, Track, TrackMetadata};
use crate::model::job::JobKind;
use crate::types::ArtistId;

#[derive(Clone, Debug)]
pub struct CanonicalStore {
    catalog: CatalogRepository,
    jobs: JobQueue,
}

/// Canonical rows for one observed play.
#[derive(Clone, Debug)]
pub struct UpsertedPlay {
    pub track: Track,
    pub album: Option<Album>,
    pub primary_artist: Option<Artist>,
}

impl CanonicalStore {
    pub fn new(catalog: CatalogRepository, jobs: JobQueue) -> Self {
        Self { catalog, jobs }
    }

    /// Match by mbid, else by exact name. A name-matched row without an
    /// mbid adopts a newly supplied one, which triggers a relationships
    /// sync. A name collision with a *different* mbid is a distinct artist.
    pub async fn upsert_artist(&self, name: &str, mbid: Option<&str>) -> Result<Artist> {
        if let Some(mbid) = mbid {
            if let Some(artist) = self.catalog.find_artist_by_mbid(mbid).await? {
                return Ok(artist);
            }
        }

        if let Some(artist) = self.catalog.find_artist_by_name(name).await? {
            match (&artist.mbid, mbid) {
                (None, Some(mbid)) => {
                    self.attach_artist_mbid(artist.id, mbid).await?;
                    return Ok(Artist {
                        mbid: Some(mbid.to_string()),
                        ..artist
                    });
                }
                (None, None) => return Ok(artist),
                (Some(_), None) => return Ok(artist),
                (Some(existing), Some(candidate)) if existing == candidate => {
                    return Ok(artist);
                }
                // Same name, different identity: fall through to insert.
                (Some(_), Some(_)) => {}
            }
        }

        let artist = self.catalog.insert_artist(name, mbid).await?;
        debug!(artist = %artist.id, name, "created artist");
        Ok(artist)
    }

    /// Attach an mbid to an existing artist and schedule a relationships
    /// sync (fire-and-forget; the active-job constraint absorbs repeats).
    pub async fn attach_artist_mbid(&self, id: ArtistId, mbid: &str) -> Result<()> {
        self.catalog.attach_artist_mbid(id, mbid).await?;
        if let Err(e) = self
            .jobs
            .enqueue(JobKind::ArtistSyncRelationships, id.as_uuid())
            .await
        {
            warn!(artist = %id, error = %e, "failed to enqueue relationships sync");
        }
        Ok(())
    }

    /// Match by mbid, else by (title, primary artist). Back-attaches mbid
    /// and fills a missing image.
    pub async fn upsert_album(
        &self,
        title: &str,
        primary_artist_id: ArtistId,
        mbid: Option<&str>,
        release_date: Option<NaiveDate>,
        image_url: Option<&str>,
    ) -> Result<Album> {
        if let Some(mbid) = mbid {
            if let Some(album) = self.catalog.find_album_by_mbid(mbid).await? {
                return Ok(album);
            }
        }

        if let Some(album) = self
            .catalog
            .find_album_by_title(title, primary_artist_id)
            .await?
        {
            if album.mbid.is_none() {
                if let Some(mbid) = mbid {
                    self.catalog.attach_album_mbid(album.id, mbid).await?;
                }
            }
            if album.image_url.is_none() {
                if let Some(url) = image_url {
                    self.catalog.set_album_image(album.id, url).await?;
                }
            }
            return Ok(album);
        }

        let album = self
            .catalog
            .insert_album(primary_artist_id, title, mbid, release_date, image_url)
            .await?;
        debug!(album = %album.id, title, "created album");
        Ok(album)
    }

    /// Match by ISRC, then by mbid, then by (title, primary artist).
    /// Back-attaches a newly available mbid.
    pub async fn upsert_track(&self, meta: &TrackMetadata) -> Result<Track> {
        if let Some(isrc) = meta.isrc.as_deref() {
            if let Some(track) = self.catalog.find_track_by_isrc(isrc).await? {
                if track.mbid.is_none() {
                    if let Some(mbid) = meta.mbid.as_deref() {
                        self.catalog.attach_track_mbid(track.id, mbid).await?;
                    }
                }
                return Ok(track);
            }
        }

        if let Some(mbid) = meta.mbid.as_deref() {
            if let Some(track) = self.catalog.find_track_by_mbid(mbid).await? {
                return Ok(track);
            }
        }

        if let Some(primary) = meta.credits.first() {
            if let Some(track) = self
                .catalog
                .find_track_by_title_and_artist(&meta.title, &primary.name)
                .await?
            {
                if track.mbid.is_none() {
                    if let Some(mbid) = meta.mbid.as_deref() {
                        self.catalog.attach_track_mbid(track.id, mbid).await?;
                    }
                }
                return Ok(track);
            }
        }

        let track = self
            .catalog
            .insert_track(
                &meta.title,
                meta.duration_ms,
                meta.mbid.as_deref(),
                meta.isrc.as_deref(),
                meta.explicit,
            )
            .await?;
        debug!(track = %track.id, title = %meta.title, "created track");
        Ok(track)
    }

    /// Full canonicalization of one play: track, every credited artist with its
    /// link row, and the album link when the play carries one. Idempotent;
    /// re-running for the same play only ensures the rows and links exist.
    pub async fn upsert_play(&self, meta: &TrackMetadata) -> Result<UpsertedPlay> {
        let track = self.upsert_track(meta).await?;

        let mut primary_artist = None;
        for (position, credit) in meta.credits.iter().enumerate() {
            let artist = self
                .upsert_artist(&credit.name, credit.mbid.as_deref())
                .await?;
            let is_primary = position == 0;
            self.catalog
                .link_track_artist(
                    track.id,
                    artist.id,
                    is_primary,
                    position as i32,
                    &credit.join_phrase,
                )
                .await?;
            if is_primary {
                primary_artist = Some(artist);
            }
        }

        let album = match (&meta.album_title, &primary_artist) {
            (Some(title), Some(primary)) => {
                let album = self
                    .upsert_album(
                        title,
                        primary.id,
                        meta.album_mbid.as_deref(),
                        meta.album_release_date,
                        meta.album_image_url.as_deref(),
                    )
                    .await?;
                self.catalog
                    .link_track_album(track.id, album.id, None, None)
                    .await?;
                Some(album)
            }
            _ => None,
        };

        Ok(UpsertedPlay {
            track,
            album,
            primary_artist,
        })
    }

    pub fn catalog(&self) -> &CatalogRepository {
        &self.catalog
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }
}
