//! Metadata resolution against MusicBrainz, memoized per worker cycle.
//!
//! Resolution order for a track: ISRC lookup first, then a scored search by
//! title/artist/album. Search hits below the confidence floor resolve to
//! `None` and are logged, never guessed at.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::coverart::CoverArtClient;
use crate::dates;
use crate::model::catalog::{ArtistCredit, TrackMetadata};
use crate::musicbrainz::{dto, MusicBrainzClient};
use crate::provider::dto::TrackObject;
use crate::error::Result;

#[derive(Default)]
struct CacheInner {
    isrc_to_recording: HashMap<String, Option<String>>,
    search_to_recording: HashMap<String, Option<String>>,
    recording_details: HashMap<String, Option<dto::RecordingResponse>>,
    release_cover: HashMap<String, Option<String>>,
}

/// Process-wide memo shared by the fast and slow loops; the enrichment
/// worker clears it at the start of each drain cycle.
pub struct MetadataResolver {
    mb: MusicBrainzClient,
    cover: CoverArtClient,
    cache: Mutex<CacheInner>,
}

impl MetadataResolver {
    pub fn new(mb: MusicBrainzClient, cover: CoverArtClient) -> Self {
        Self {
            mb,
            cover,
            cache: Mutex::new(CacheInner::default()),
        }
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().expect("resolver cache poisoned");
        *cache = CacheInner::default();
    }

    /// ISRC → recording id, memoized including negative results.
    pub async fn recording_id_by_isrc(&self, isrc: &str) -> Result<Option<String>> {
        if let Some(hit) = self
            .cache
            .lock()
            .expect("resolver cache poisoned")
            .isrc_to_recording
            .get(isrc)
        {
            return Ok(hit.clone());
        }
        let resolved = self.mb.lookup_recording_by_isrc(isrc).await?;
        self.cache
            .lock()
            .expect("resolver cache poisoned")
            .isrc_to_recording
            .insert(isrc.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Scored search → recording id. Accepts only hits at or above the
    /// configured confidence floor.
    pub async fn recording_id_by_search(
        &self,
        title: &str,
        artist: &str,
        album: Option<&str>,
    ) -> Result<Option<String>> {
        let key = search_key(title, artist, album);
        if let Some(hit) = self
            .cache
            .lock()
            .expect("resolver cache poisoned")
            .search_to_recording
            .get(&key)
        {
            return Ok(hit.clone());
        }

        let results = self.mb.search_recordings(title, artist, album).await?;
        let resolved = match results.first() {
            Some(best) if best.score >= self.mb.min_search_score() => Some(best.id.clone()),
            Some(best) => {
                info!(
                    title,
                    artist,
                    score = best.score,
                    "best search hit below confidence floor, treating as no match"
                );
                None
            }
            None => None,
        };

        self.cache
            .lock()
            .expect("resolver cache poisoned")
            .search_to_recording
            .insert(key, resolved.clone());
        Ok(resolved)
    }

    pub async fn recording_details(
        &self,
        mbid: &str,
    ) -> Result<Option<dto::RecordingResponse>> {
        if let Some(hit) = self
            .cache
            .lock()
            .expect("resolver cache poisoned")
            .recording_details
            .get(mbid)
        {
            return Ok(hit.clone());
        }
        let details = self.mb.lookup_recording(mbid).await?;
        self.cache
            .lock()
            .expect("resolver cache poisoned")
            .recording_details
            .insert(mbid.to_string(), details.clone());
        Ok(details)
    }

    pub async fn cover_url(&self, release_mbid: &str) -> Option<String> {
        if let Some(hit) = self
            .cache
            .lock()
            .expect("resolver cache poisoned")
            .release_cover
            .get(release_mbid)
        {
            return hit.clone();
        }
        let url = self.cover.front_cover_url(release_mbid).await;
        self.cache
            .lock()
            .expect("resolver cache poisoned")
            .release_cover
            .insert(release_mbid.to_string(), url.clone());
        url
    }

    pub fn musicbrainz(&self) -> &MusicBrainzClient {
        &self.mb
    }

    /// Full resolution for one observed play: start from the provider's
    /// view and enrich it with MusicBrainz identifiers when the recording
    /// resolves. Resolution failure falls back to provider data alone.
    pub async fn resolve_play(&self, track: &TrackObject) -> TrackMetadata {
        let mut meta = track.to_metadata();

        let recording_id = match self.resolve_recording_id(track).await {
            Ok(id) => id,
            Err(e) => {
                debug!(track = %track.name, error = %e, "metadata resolution unavailable");
                None
            }
        };
        let Some(recording_id) = recording_id else {
            return meta;
        };

        let details = match self.recording_details(&recording_id).await {
            Ok(Some(d)) => d,
            Ok(None) => return meta,
            Err(e) => {
                debug!(recording_id, error = %e, "recording lookup failed");
                return meta;
            }
        };

        meta.mbid = Some(details.id.clone());
        if meta.isrc.is_none() {
            meta.isrc = details.isrcs.first().cloned();
        }
        if !details.artist_credit.is_empty() {
            meta.credits = details
                .artist_credit
                .iter()
                .map(|credit| ArtistCredit {
                    name: credit.artist.name.clone(),
                    mbid: Some(credit.artist.id.clone()),
                    join_phrase: credit.joinphrase.clone(),
                })
                .collect();
        }

        // Match the provider's album title against the recording's releases
        // to pin down the release mbid; an unmatched album stays unpinned.
        if let Some(album_title) = meta.album_title.clone() {
            let matched = details
                .releases
                .iter()
                .find(|release| release.title.eq_ignore_ascii_case(&album_title));
            if let Some(release) = matched {
                meta.album_mbid = Some(release.id.clone());
                if meta.album_release_date.is_none() {
                    meta.album_release_date =
                        release.date.as_deref().and_then(dates::normalize);
                }
            }
        }

        meta
    }

    async fn resolve_recording_id(&self, track: &TrackObject) -> Result<Option<String>> {
        if let Some(isrc) = track.isrc() {
            if let Some(id) = self.recording_id_by_isrc(isrc).await? {
                return Ok(Some(id));
            }
        }
        let Some(artist) = track.primary_artist_name() else {
            return Ok(None);
        };
        let album = track.album.as_ref().map(|a| a.name.as_str());
        self.recording_id_by_search(&track.name, artist, album).await
    }
}

fn search_key(title: &str, artist: &str, album: Option<&str>) -> String {
    format!(
        "{}|{}|{}",
        title.to_lowercase(),
        artist.to_lowercase(),
        album.unwrap_or_default().to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_key_is_case_insensitive() {
        assert_eq!(
            search_key("Hey Jude", "The Beatles", Some("Hey Jude")),
            search_key("hey jude", "the beatles", Some("HEY JUDE"))
        );
        assert_ne!(
            search_key("Hey Jude", "The Beatles", None),
            search_key("Hey Jude", "The Beatles", Some("1967-1970"))
        );
    }
}
