//! Tunable knobs for the ingestion and enrichment engines.
//!
//! Every field has a production default; the server binary overrides them
//! from environment variables.

/// Fast-loop session engine tuning.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Cadence of the currently-playing poll loop.
    pub poll_interval_ms: u64,
    /// Lower bound A for "long enough to scrobble", in seconds.
    pub min_play_seconds: i64,
    /// Lower bound B: percentage of track duration.
    pub min_play_percent: i64,
    /// Floor for the loop-detection threshold.
    pub wrap_min_tolerance_ms: i64,
    /// Fraction of duration whose backward jump counts as a loop.
    pub wrap_threshold_percent: i64,
    /// Cap on accumulation per poll; protects against forward seeks.
    pub max_delta_ms: i64,
    /// Idle time before an unplayed session is finalized and cleared.
    pub stale_session_ms: i64,
    /// Below this fraction of duration a scrobbled play is marked skipped.
    pub skip_threshold_percent: i64,
    /// If accumulated + margin covers the duration, treat as a full play.
    pub end_margin_ms: i64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 8_000,
            min_play_seconds: 30,
            min_play_percent: 50,
            wrap_min_tolerance_ms: 15_000,
            wrap_threshold_percent: 35,
            max_delta_ms: 30_000,
            stale_session_ms: 1_800_000,
            skip_threshold_percent: 90,
            end_margin_ms: 15_000,
        }
    }
}

/// Slow-loop reconciler tuning.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    pub interval_ms: u64,
    /// Provider page size; the API caps at 50.
    pub fetch_limit: u32,
    /// Half-width of the cross-path dedupe window. Must exceed typical
    /// track length plus clock skew: reconciler timestamps mark the end of
    /// a play while session timestamps mark the start.
    pub dedupe_window_secs: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            fetch_limit: 50,
            dedupe_window_secs: 600,
        }
    }
}

/// Enrichment queue behaviour.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub claim_batch_size: i64,
    /// A running job whose lock is older than this is considered abandoned
    /// and may be reclaimed.
    pub lease_timeout_secs: i64,
    pub retry_backoff_base_secs: i64,
    pub retry_backoff_multiplier: f64,
    pub retry_backoff_cap_secs: i64,
    pub default_max_attempts: i32,
    /// Terminal rows older than this are reaped.
    pub completed_ttl_secs: i64,
    pub reap_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            claim_batch_size: 10,
            lease_timeout_secs: 1_800,
            retry_backoff_base_secs: 60,
            retry_backoff_multiplier: 2.0,
            retry_backoff_cap_secs: 3_600,
            default_max_attempts: 5,
            completed_ttl_secs: 3 * 24 * 3_600,
            reap_interval_ms: 3_600_000,
        }
    }
}

/// Enrichment worker pacing.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Sleep between jobs, to stay under the upstream rate limit even with
    /// several workers.
    pub job_delay_ms: u64,
    /// Sleep when the queue is empty.
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_delay_ms: 3_000,
            poll_interval_ms: 30_000,
        }
    }
}

/// Rate-limited MusicBrainz client tuning.
#[derive(Clone, Debug)]
pub struct MusicBrainzConfig {
    /// Mandatory; startup fails when empty.
    pub user_agent: String,
    pub base_url: String,
    pub cover_art_base_url: String,
    pub min_request_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Search results below this relevance score resolve to "no match".
    pub min_search_score: u8,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            base_url: "https://musicbrainz.org/ws/2".to_string(),
            cover_art_base_url: "https://coverartarchive.org".to_string(),
            min_request_interval_ms: 1_100,
            max_attempts: 5,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 60_000,
            min_search_score: 80,
        }
    }
}

/// Streaming-provider OAuth client settings.
#[derive(Clone, Debug)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base_url: String,
    pub token_url: String,
    /// Tokens are refreshed this many seconds before their real expiry.
    pub token_safety_margin_secs: i64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            api_base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            token_safety_margin_secs: 60,
        }
    }
}
