//! Server configuration, loaded from the environment (plus optional CLI
//! overrides in `main`). Every timing knob has a production default; only
//! the database URL, provider credentials, and the metadata User-Agent are
//! required.

use anyhow::{anyhow, Context};
use std::env;

use waxwing_core::config::{
    MusicBrainzConfig, PlaybackConfig, QueueConfig, ReconcilerConfig, SpotifyConfig, WorkerConfig,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,

    pub database_url: String,

    /// Accepted from the environment for the outer auth surface; the core
    /// treats it as opaque.
    pub jwt_secret: String,

    pub playback: PlaybackConfig,
    pub reconciler: ReconcilerConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub musicbrainz: MusicBrainzConfig,
    pub spotify: SpotifyConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow!("DATABASE_URL must be set"))?;

        let spotify = SpotifyConfig {
            client_id: env::var("SPOTIFY_CLIENT_ID")
                .map_err(|_| anyhow!("SPOTIFY_CLIENT_ID must be set"))?,
            client_secret: env::var("SPOTIFY_CLIENT_SECRET")
                .map_err(|_| anyhow!("SPOTIFY_CLIENT_SECRET must be set"))?,
            redirect_uri: env::var("SPOTIFY_REDIRECT_URI").unwrap_or_default(),
            ..SpotifyConfig::default()
        };

        let musicbrainz = MusicBrainzConfig {
            // Mandatory: MusicBrainz rejects anonymous clients.
            user_agent: env::var("METADATA_USER_AGENT")
                .map_err(|_| anyhow!("METADATA_USER_AGENT must be set"))?,
            min_request_interval_ms: env_parse("MB_MIN_REQUEST_INTERVAL_MS", 1_100)?,
            ..MusicBrainzConfig::default()
        };

        let defaults = PlaybackConfig::default();
        let playback = PlaybackConfig {
            poll_interval_ms: env_parse("POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            min_play_seconds: env_parse("MIN_PLAY_SECONDS", defaults.min_play_seconds)?,
            min_play_percent: env_parse("MIN_PLAY_PERCENT", defaults.min_play_percent)?,
            wrap_min_tolerance_ms: env_parse(
                "WRAP_MIN_TOLERANCE_MS",
                defaults.wrap_min_tolerance_ms,
            )?,
            wrap_threshold_percent: env_parse(
                "WRAP_THRESHOLD_PERCENT",
                defaults.wrap_threshold_percent,
            )?,
            max_delta_ms: env_parse("MAX_DELTA_MS", defaults.max_delta_ms)?,
            stale_session_ms: env_parse("STALE_SESSION_MS", defaults.stale_session_ms)?,
            skip_threshold_percent: env_parse(
                "SKIP_THRESHOLD_PERCENT",
                defaults.skip_threshold_percent,
            )?,
            end_margin_ms: env_parse("END_MARGIN_MS", defaults.end_margin_ms)?,
        };

        let reconciler_defaults = ReconcilerConfig::default();
        let reconciler = ReconcilerConfig {
            interval_ms: env_parse(
                "RECENTLY_PLAYED_INTERVAL_MS",
                reconciler_defaults.interval_ms,
            )?,
            fetch_limit: env_parse("RECENTLY_PLAYED_LIMIT", reconciler_defaults.fetch_limit)?,
            dedupe_window_secs: env_parse(
                "RECONCILER_DEDUPE_WINDOW_SECS",
                reconciler_defaults.dedupe_window_secs,
            )?,
        };

        let queue_defaults = QueueConfig::default();
        let queue = QueueConfig {
            claim_batch_size: env_parse("JOB_CLAIM_BATCH_SIZE", queue_defaults.claim_batch_size)?,
            lease_timeout_secs: env_parse("JOB_LEASE_TIMEOUT_SECS", queue_defaults.lease_timeout_secs)?,
            completed_ttl_secs: env_parse("JOB_COMPLETED_TTL_SECS", queue_defaults.completed_ttl_secs)?,
            ..queue_defaults
        };

        let worker_defaults = WorkerConfig::default();
        let worker = WorkerConfig {
            job_delay_ms: env_parse("JOB_DELAY_MS", worker_defaults.job_delay_ms)?,
            poll_interval_ms: env_parse(
                "WORKER_POLL_INTERVAL_MS",
                worker_defaults.poll_interval_ms,
            )?,
        };

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "4110".to_string())
                .parse()
                .unwrap_or(4110),
            database_url,
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            playback,
            reconciler,
            queue,
            worker,
            musicbrainz,
            spotify,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
