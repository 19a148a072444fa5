//! Wire DTOs for the MusicBrainz ws/2 JSON API.
//!
//! Only the fields this crate reads are modelled; everything else is
//! ignored at deserialization.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct IsrcResponse {
    #[serde(default)]
    pub recordings: Vec<RecordingStub>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecordingStub {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecordingSearchResponse {
    #[serde(default)]
    pub recordings: Vec<RecordingSearchResult>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RecordingSearchResult {
    pub id: String,
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub title: String,
}

/// Full recording lookup with `inc=artists+releases+isrcs`.
#[derive(Clone, Debug, Deserialize)]
pub struct RecordingResponse {
    pub id: String,
    pub title: String,
    /// Length in milliseconds.
    pub length: Option<i64>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCreditEntry>,
    #[serde(default)]
    pub releases: Vec<ReleaseStub>,
    #[serde(default)]
    pub isrcs: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtistCreditEntry {
    pub name: String,
    #[serde(default)]
    pub joinphrase: String,
    pub artist: ArtistStub,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtistStub {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReleaseStub {
    pub id: String,
    pub title: String,
    pub date: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtistSearchResponse {
    #[serde(default)]
    pub artists: Vec<ArtistSearchResult>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtistSearchResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub score: u8,
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
}

/// Artist lookup with `inc=artist-rels`.
#[derive(Clone, Debug, Deserialize)]
pub struct ArtistResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    pub gender: Option<String>,
    #[serde(rename = "life-span")]
    pub life_span: Option<LifeSpan>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LifeSpan {
    pub begin: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub ended: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Relation {
    #[serde(rename = "type")]
    pub relation_type: String,
    pub direction: String,
    pub artist: Option<ArtistStub>,
    pub begin: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub ended: bool,
}

impl Relation {
    pub fn is_band_membership(&self) -> bool {
        self.relation_type == "member of band"
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReleaseSearchResponse {
    #[serde(default)]
    pub releases: Vec<ReleaseSearchResult>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReleaseSearchResult {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub score: u8,
    pub date: Option<String>,
}

/// Release lookup (no extra includes).
#[derive(Clone, Debug, Deserialize)]
pub struct ReleaseResponse {
    pub id: String,
    pub title: String,
    pub date: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiError {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recording_lookup() {
        let body = r#"{
            "id": "b1a9c0e9-d987-4042-ae91-78d6a3267d69",
            "title": "Hey Jude",
            "length": 425653,
            "artist-credit": [
                {
                    "name": "The Beatles",
                    "joinphrase": "",
                    "artist": {
                        "id": "b10bbbfc-cf9e-42e0-be17-e2c3e1d2600d",
                        "name": "The Beatles",
                        "type": "Group"
                    }
                }
            ],
            "releases": [
                {"id": "rel-1", "title": "Hey Jude", "date": "1968-08-26"}
            ],
            "isrcs": ["GBAYE0601690"]
        }"#;

        let parsed: RecordingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.title, "Hey Jude");
        assert_eq!(parsed.length, Some(425_653));
        assert_eq!(parsed.artist_credit.len(), 1);
        assert_eq!(parsed.artist_credit[0].artist.artist_type.as_deref(), Some("Group"));
        assert_eq!(parsed.isrcs[0], "GBAYE0601690");
    }

    #[test]
    fn parses_membership_relations() {
        let body = r#"{
            "id": "mbid-group",
            "name": "The Beatles",
            "type": "Group",
            "gender": null,
            "life-span": {"begin": "1960", "end": "1970-04-10", "ended": true},
            "relations": [
                {
                    "type": "member of band",
                    "direction": "backward",
                    "artist": {"id": "mbid-paul", "name": "Paul McCartney", "type": "Person"},
                    "begin": "1960",
                    "end": "1970",
                    "ended": true
                },
                {
                    "type": "subgroup",
                    "direction": "forward",
                    "artist": {"id": "mbid-x", "name": "X", "type": "Group"},
                    "begin": null,
                    "end": null,
                    "ended": false
                }
            ]
        }"#;

        let parsed: ArtistResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.relations.len(), 2);
        assert!(parsed.relations[0].is_band_membership());
        assert!(!parsed.relations[1].is_band_membership());
        assert_eq!(parsed.life_span.unwrap().end.as_deref(), Some("1970-04-10"));
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let parsed: IsrcResponse = serde_json::from_str(r#"{"isrc": "X"}"#).unwrap();
        assert!(parsed.recordings.is_empty());
    }
}
