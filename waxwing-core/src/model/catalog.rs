use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AlbumId, ArtistId, TrackId};

/// MusicBrainz artist types, stored as lowercase text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtistType {
    Person,
    Group,
    Orchestra,
    Choir,
    Character,
    Other,
}

impl ArtistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtistType::Person => "person",
            ArtistType::Group => "group",
            ArtistType::Orchestra => "orchestra",
            ArtistType::Choir => "choir",
            ArtistType::Character => "character",
            ArtistType::Other => "other",
        }
    }

    /// Parse the strings MusicBrainz emits ("Person", "Group", ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "person" => Some(ArtistType::Person),
            "group" => Some(ArtistType::Group),
            "orchestra" => Some(ArtistType::Orchestra),
            "choir" => Some(ArtistType::Choir),
            "character" => Some(ArtistType::Character),
            "other" => Some(ArtistType::Other),
            _ => None,
        }
    }

    pub fn is_group_like(&self) -> bool {
        matches!(
            self,
            ArtistType::Group | ArtistType::Orchestra | ArtistType::Choir
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub mbid: Option<String>,
    pub artist_type: Option<ArtistType>,
    pub gender: Option<String>,
    pub begin_date_raw: Option<String>,
    pub end_date_raw: Option<String>,
    pub image_url: Option<String>,
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artist {
    pub fn is_group(&self) -> bool {
        self.artist_type.map(|t| t.is_group_like()).unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Album {
    pub id: AlbumId,
    pub artist_id: ArtistId,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub mbid: Option<String>,
    pub image_url: Option<String>,
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub duration_ms: Option<i64>,
    pub mbid: Option<String>,
    pub isrc: Option<String>,
    pub explicit: bool,
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One artist credit on a track, in credit order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
    pub mbid: Option<String>,
    pub join_phrase: String,
}

/// Everything the upsert layer needs to canonicalize one observed play.
#[derive(Clone, Debug, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub duration_ms: Option<i64>,
    pub mbid: Option<String>,
    pub isrc: Option<String>,
    pub explicit: bool,
    pub credits: Vec<ArtistCredit>,
    pub album_title: Option<String>,
    pub album_mbid: Option<String>,
    pub album_release_date: Option<NaiveDate>,
    pub album_image_url: Option<String>,
}

/// A membership stint of a member artist in a group artist. A (member,
/// group) pair may have several stints; the raw date strings key them.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct GroupMembership {
    pub id: uuid::Uuid,
    pub member_id: ArtistId,
    pub group_id: ArtistId,
    pub begin_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub begin_date_raw: Option<String>,
    pub end_date_raw: Option<String>,
    pub ended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
