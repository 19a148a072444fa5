//! Wire DTOs for the streaming provider's Web API.
//!
//! The currently-playing payload is heterogeneous (`currently_playing_type`
//! of track, episode, ad, unknown); the raw `item` is kept as JSON and only
//! parsed into a `TrackObject` once the type is known to be a track.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::model::catalog::{ArtistCredit, TrackMetadata};

#[derive(Clone, Debug, Deserialize)]
pub struct CurrentlyPlayingResponse {
    pub item: Option<serde_json::Value>,
    pub progress_ms: Option<i64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default = "default_playing_type")]
    pub currently_playing_type: String,
    #[serde(default)]
    pub timestamp: i64,
}

fn default_playing_type() -> String {
    "unknown".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    pub duration_ms: i64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: Option<AlbumObject>,
    pub external_ids: Option<ExternalIds>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtistObject {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlbumObject {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageObject>,
    pub release_date: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageObject {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecentlyPlayedResponse {
    #[serde(default)]
    pub items: Vec<PlayHistoryItem>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayHistoryItem {
    pub track: TrackObject,
    pub played_at: DateTime<Utc>,
}

impl TrackObject {
    pub fn isrc(&self) -> Option<&str> {
        self.external_ids.as_ref().and_then(|ids| ids.isrc.as_deref())
    }

    pub fn primary_artist_name(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }

    /// Provider-side view of the track, used when MusicBrainz resolution
    /// yields nothing. Credits carry no external ids.
    pub fn to_metadata(&self) -> TrackMetadata {
        let credits = self
            .artists
            .iter()
            .enumerate()
            .map(|(i, artist)| ArtistCredit {
                name: artist.name.clone(),
                mbid: None,
                join_phrase: if i + 1 < self.artists.len() {
                    ", ".to_string()
                } else {
                    String::new()
                },
            })
            .collect();

        let album = self.album.as_ref();
        TrackMetadata {
            title: self.name.clone(),
            duration_ms: Some(self.duration_ms),
            mbid: None,
            isrc: self.isrc().map(str::to_string),
            explicit: self.explicit,
            credits,
            album_title: album.map(|a| a.name.clone()),
            album_mbid: None,
            album_release_date: album
                .and_then(|a| a.release_date.as_deref())
                .and_then(dates::normalize),
            album_image_url: album.and_then(|a| a.largest_image()),
        }
    }
}

impl AlbumObject {
    pub fn largest_image(&self) -> Option<String> {
        self.images
            .iter()
            .max_by_key(|img| img.width.unwrap_or(0))
            .map(|img| img.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_currently_playing_track() {
        let body = r#"{
            "item": {
                "id": "4iV5W9uYEdYUVa79Axb7Rh",
                "uri": "spotify:track:4iV5W9uYEdYUVa79Axb7Rh",
                "name": "Harvest Moon",
                "duration_ms": 303000,
                "explicit": false,
                "artists": [{"id": "abc", "name": "Neil Young"}],
                "album": {
                    "id": "alb",
                    "name": "Harvest Moon",
                    "images": [
                        {"url": "small.jpg", "width": 64, "height": 64},
                        {"url": "big.jpg", "width": 640, "height": 640}
                    ],
                    "release_date": "1992-11-02"
                },
                "external_ids": {"isrc": "USRE19200001"}
            },
            "progress_ms": 12345,
            "is_playing": true,
            "currently_playing_type": "track",
            "timestamp": 1700000000000
        }"#;

        let parsed: CurrentlyPlayingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.currently_playing_type, "track");
        let track: TrackObject =
            serde_json::from_value(parsed.item.unwrap()).unwrap();
        assert_eq!(track.isrc(), Some("USRE19200001"));
        assert_eq!(track.album.as_ref().unwrap().largest_image().as_deref(), Some("big.jpg"));

        let meta = track.to_metadata();
        assert_eq!(meta.title, "Harvest Moon");
        assert_eq!(meta.duration_ms, Some(303_000));
        assert_eq!(meta.credits.len(), 1);
        assert_eq!(meta.credits[0].join_phrase, "");
        assert_eq!(
            meta.album_release_date,
            chrono::NaiveDate::from_ymd_opt(1992, 11, 2)
        );
    }

    #[test]
    fn episode_payload_keeps_item_opaque() {
        let body = r#"{
            "item": {"id": "ep1", "name": "Some Podcast"},
            "progress_ms": 1000,
            "is_playing": true,
            "currently_playing_type": "episode",
            "timestamp": 1700000000000
        }"#;
        let parsed: CurrentlyPlayingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.currently_playing_type, "episode");
    }

    #[test]
    fn join_phrases_separate_multiple_credits() {
        let track = TrackObject {
            id: None,
            uri: "spotify:track:x".into(),
            name: "Duet".into(),
            duration_ms: 1000,
            explicit: false,
            artists: vec![
                ArtistObject { id: None, name: "A".into() },
                ArtistObject { id: None, name: "B".into() },
            ],
            album: None,
            external_ids: None,
        };
        let meta = track.to_metadata();
        assert_eq!(meta.credits[0].join_phrase, ", ");
        assert_eq!(meta.credits[1].join_phrase, "");
    }
}
