//! Cover Art Archive client.
//!
//! Cover art is decoration: every failure here, including 404 and network
//! errors, downgrades to "no image" instead of propagating.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::MusicBrainzConfig;
use crate::error::Result;

#[derive(Clone, Debug, Deserialize)]
struct CoverArtResponse {
    #[serde(default)]
    images: Vec<CoverArtImage>,
}

#[derive(Clone, Debug, Deserialize)]
struct CoverArtImage {
    #[serde(default)]
    front: bool,
    image: String,
    #[serde(default)]
    thumbnails: HashMap<String, String>,
}

impl CoverArtImage {
    /// Thumbnail preference: 1200 → 500 → large → 250 → full image.
    fn best_url(&self) -> String {
        for key in ["1200", "500", "large", "250"] {
            if let Some(url) = self.thumbnails.get(key) {
                return url.clone();
            }
        }
        self.image.clone()
    }
}

pub struct CoverArtClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoverArtClient {
    /// Shares the MusicBrainz User-Agent but not its serial queue; the
    /// archive sits behind a CDN with far gentler limits.
    pub fn new(config: &MusicBrainzConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: config.cover_art_base_url.clone(),
        })
    }

    /// Front-cover URL for a release, or `None` when there is no art or the
    /// archive is unreachable.
    pub async fn front_cover_url(&self, release_mbid: &str) -> Option<String> {
        let url = format!("{}/release/{}", self.base_url, release_mbid);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(release_mbid, error = %e, "cover art fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(release_mbid, status = %response.status(), "no cover art");
            return None;
        }

        let body: CoverArtResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                debug!(release_mbid, error = %e, "cover art response unparseable");
                return None;
            }
        };

        body.images
            .iter()
            .find(|img| img.front)
            .or_else(|| body.images.first())
            .map(CoverArtImage::best_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(front: bool, thumbs: &[(&str, &str)]) -> CoverArtImage {
        CoverArtImage {
            front,
            image: "https://archive.example/full.jpg".to_string(),
            thumbnails: thumbs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn prefers_largest_thumbnail() {
        let img = image(true, &[("250", "u250"), ("500", "u500"), ("1200", "u1200")]);
        assert_eq!(img.best_url(), "u1200");
    }

    #[test]
    fn falls_back_to_full_image() {
        let img = image(true, &[]);
        assert_eq!(img.best_url(), "https://archive.example/full.jpg");
    }

    #[test]
    fn parses_archive_response() {
        let body = r#"{
            "images": [
                {"front": false, "image": "back.jpg", "thumbnails": {}},
                {"front": true, "image": "front.jpg", "thumbnails": {"500": "front-500.jpg"}}
            ]
        }"#;
        let parsed: CoverArtResponse = serde_json::from_str(body).unwrap();
        let front = parsed.images.iter().find(|i| i.front).unwrap();
        assert_eq!(front.best_url(), "front-500.jpg");
    }
}
