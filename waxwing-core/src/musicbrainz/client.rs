//! Rate-limited MusicBrainz HTTP client.
//!
//! MusicBrainz requires a User-Agent and allows roughly one request per
//! second per client. All requests flow through a single serialized gate
//! that enforces the minimum inter-request interval; 503 responses and
//! transient network errors retry with capped exponential backoff.

use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::dto;
use crate::config::MusicBrainzConfig;
use crate::error::{CoreError, Result};
use crate::musicbrainz::lucene;

pub struct MusicBrainzClient {
    http: reqwest::Client,
    config: MusicBrainzConfig,
    /// Instant of the last dispatched request. Holding this lock across the
    /// send is what makes dispatch serial.
    gate: Mutex<Option<Instant>>,
}

impl MusicBrainzClient {
    pub fn new(config: MusicBrainzConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(CoreError::Config(
                "MusicBrainz User-Agent must be set (METADATA_USER_AGENT)".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(CoreError::Http)?;

        Ok(Self {
            http,
            config,
            gate: Mutex::new(None),
        })
    }

    pub fn min_search_score(&self) -> u8 {
        self.config.min_search_score
    }

    /// Look up the recording ids registered for an ISRC. 404 means the ISRC
    /// is unknown, which is a domain "not found" rather than an error.
    pub async fn lookup_recording_by_isrc(&self, isrc: &str) -> Result<Option<String>> {
        let url = format!("{}/isrc/{}?fmt=json", self.config.base_url, isrc);
        let response: Option<dto::IsrcResponse> = self.get_json(&url).await?;
        Ok(response.and_then(|r| r.recordings.into_iter().next().map(|rec| rec.id)))
    }

    /// Search recordings by title, artist name, and optionally release title.
    pub async fn search_recordings(
        &self,
        title: &str,
        artist: &str,
        album: Option<&str>,
    ) -> Result<Vec<dto::RecordingSearchResult>> {
        let mut query = format!(
            "recording:\"{}\" AND artist:\"{}\"",
            lucene::escape(title),
            lucene::escape(artist)
        );
        if let Some(album) = album {
            query.push_str(&format!(" AND release:\"{}\"", lucene::escape(album)));
        }

        let url = format!(
            "{}/recording?query={}&limit=5&fmt=json",
            self.config.base_url,
            urlencode(&query)
        );
        let response: Option<dto::RecordingSearchResponse> = self.get_json(&url).await?;
        Ok(response.map(|r| r.recordings).unwrap_or_default())
    }

    pub async fn lookup_recording(&self, mbid: &str) -> Result<Option<dto::RecordingResponse>> {
        let url = format!(
            "{}/recording/{}?inc=artists+releases+isrcs&fmt=json",
            self.config.base_url, mbid
        );
        self.get_json(&url).await
    }

    pub async fn search_artists(&self, name: &str) -> Result<Vec<dto::ArtistSearchResult>> {
        let query = format!("artist:\"{}\"", lucene::escape(name));
        let url = format!(
            "{}/artist?query={}&limit=5&fmt=json",
            self.config.base_url,
            urlencode(&query)
        );
        let response: Option<dto::ArtistSearchResponse> = self.get_json(&url).await?;
        Ok(response.map(|r| r.artists).unwrap_or_default())
    }

    /// Artist lookup including band-membership relations.
    pub async fn lookup_artist_with_relations(
        &self,
        mbid: &str,
    ) -> Result<Option<dto::ArtistResponse>> {
        let url = format!(
            "{}/artist/{}?inc=artist-rels&fmt=json",
            self.config.base_url, mbid
        );
        self.get_json(&url).await
    }

    pub async fn search_releases(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Vec<dto::ReleaseSearchResult>> {
        let query = format!(
            "release:\"{}\" AND artist:\"{}\"",
            lucene::escape(title),
            lucene::escape(artist)
        );
        let url = format!(
            "{}/release?query={}&limit=5&fmt=json",
            self.config.base_url,
            urlencode(&query)
        );
        let response: Option<dto::ReleaseSearchResponse> = self.get_json(&url).await?;
        Ok(response.map(|r| r.releases).unwrap_or_default())
    }

    pub async fn lookup_release(&self, mbid: &str) -> Result<Option<dto::ReleaseResponse>> {
        let url = format!("{}/release/{}?fmt=json", self.config.base_url, mbid);
        self.get_json(&url).await
    }

    /// GET a MusicBrainz URL through the serial gate with retry on 503 and
    /// transient network failures. `Ok(None)` is 404.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.dispatch(url).await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if status == StatusCode::SERVICE_UNAVAILABLE {
                        if attempt >= self.config.max_attempts {
                            return Err(CoreError::Metadata {
                                status: 503,
                                message: "service unavailable, retries exhausted".to_string(),
                            });
                        }
                        let delay = self.backoff_delay(attempt);
                        warn!(url, attempt, delay_ms = delay.as_millis() as u64,
                              "MusicBrainz asked us to back off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if !status.is_success() {
                        let message = match response.json::<dto::ApiError>().await {
                            Ok(e) => e.error,
                            Err(_) => status
                                .canonical_reason()
                                .unwrap_or("unexpected status")
                                .to_string(),
                        };
                        return Err(CoreError::Metadata {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    return Ok(Some(response.json::<T>().await.map_err(CoreError::Http)?));
                }
                Err(e) if is_transient(&e) && attempt < self.config.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(url, attempt, error = %e, delay_ms = delay.as_millis() as u64,
                          "transient MusicBrainz error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(CoreError::Http(e)),
            }
        }
    }

    /// One request at a time, at least `min_request_interval_ms` apart.
    async fn dispatch(&self, url: &str) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut gate = self.gate.lock().await;
        if let Some(last) = *gate {
            let min = Duration::from_millis(self.config.min_request_interval_ms);
            let elapsed = last.elapsed();
            if elapsed < min {
                tokio::time::sleep(min - elapsed).await;
            }
        }
        debug!(url, "MusicBrainz request");
        let result = self.http.get(url).send().await;
        *gate = Some(Instant::now());
        result
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms as f64;
        let exp = base * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.config.backoff_cap_ms as f64);
        let jittered = capped * rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis(jittered as u64)
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MusicBrainzClient {
        MusicBrainzClient::new(MusicBrainzConfig {
            user_agent: "waxwing-tests/0.1 (test@waxwing.example)".to_string(),
            ..MusicBrainzConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn empty_user_agent_is_a_startup_error() {
        let result = MusicBrainzClient::new(MusicBrainzConfig::default());
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let client = client();
        // Jitter is ±20%, so check against the envelope.
        let first = client.backoff_delay(1).as_millis() as f64;
        assert!((1_600.0..=2_400.0).contains(&first));
        let tenth = client.backoff_delay(10).as_millis() as f64;
        assert!(tenth <= 60_000.0 * 1.2);
    }

    #[test]
    fn urlencode_handles_query_syntax() {
        assert_eq!(urlencode("a b"), "a%20b");
        assert_eq!(urlencode("a&b"), "a%26b");
        assert_eq!(urlencode("AC\\/DC"), "AC%5C%2FDC");
    }
}
