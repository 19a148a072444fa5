//! Player endpoints: currently-playing and recently-played.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

use super::dto::{
    CurrentlyPlayingResponse, PlayHistoryItem, RecentlyPlayedResponse, TrackObject,
};
use crate::config::SpotifyConfig;
use crate::error::{CoreError, Result};

/// One poll of the currently-playing endpoint, already narrowed at the
/// wire boundary. Non-track payloads (episodes, ads) are rejected early.
#[derive(Clone, Debug)]
pub enum PollOutcome {
    NoContent,
    NotATrack,
    Track(TrackSnapshot),
}

#[derive(Clone, Debug)]
pub struct TrackSnapshot {
    pub uri: String,
    pub progress_ms: i64,
    pub is_playing: bool,
    pub duration_ms: Option<i64>,
    pub track: TrackObject,
    /// Verbatim provider `item` JSON, persisted into the session row so
    /// finalization never has to re-query the provider.
    pub metadata: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

pub struct PlayerClient {
    http: reqwest::Client,
    base_url: String,
}

impl PlayerClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
        })
    }

    pub async fn currently_playing(&self, access_token: &str) -> Result<PollOutcome> {
        let url = format!("{}/me/player/currently-playing", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => return Ok(PollOutcome::NoContent),
            status if !status.is_success() => {
                return Err(CoreError::Provider {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            _ => {}
        }

        let body: CurrentlyPlayingResponse = response.json().await?;
        if body.currently_playing_type != "track" {
            return Ok(PollOutcome::NotATrack);
        }
        let Some(item) = body.item else {
            return Ok(PollOutcome::NotATrack);
        };
        let track: TrackObject = match serde_json::from_value(item.clone()) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "currently-playing item did not parse as a track");
                return Ok(PollOutcome::NotATrack);
            }
        };

        Ok(PollOutcome::Track(TrackSnapshot {
            uri: track.uri.clone(),
            progress_ms: body.progress_ms.unwrap_or(0),
            is_playing: body.is_playing,
            duration_ms: Some(track.duration_ms),
            track,
            metadata: item,
            observed_at: Utc::now(),
        }))
    }

    /// Plays after `after` (Unix millis), oldest first. The provider caps
    /// the page at 50 items and reports newest-first; we re-sort ascending.
    pub async fn recently_played(
        &self,
        access_token: &str,
        after_ms: Option<i64>,
        limit: u32,
    ) -> Result<Vec<PlayHistoryItem>> {
        let mut url = format!(
            "{}/me/player/recently-played?limit={}",
            self.base_url,
            limit.min(50)
        );
        if let Some(after) = after_ms {
            url.push_str(&format!("&after={after}"));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Provider {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: RecentlyPlayedResponse = response.json().await?;
        let mut items = body.items;
        items.sort_by_key(|item| item.played_at);
        Ok(items)
    }
}
