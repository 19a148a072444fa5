//! Playback session engine: the fast-loop state machine over polled
//! currently-playing snapshots.

pub mod engine;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::database::{AccountsRepository, ScrobbleRepository, SessionRepository};
use crate::error::Result;
use crate::model::scrobble::NewScrobble;
use crate::model::{Account, PlaybackSession};
use crate::provider::dto::TrackObject;
use crate::provider::{PlayerClient, PollOutcome, TokenClient, TrackSnapshot};
use crate::resolver::MetadataResolver;
use crate::store::CanonicalStore;
use crate::types::UserId;

use engine::ContinuationAction;

/// Half-width of the same-path dedupe bracket around a session's
/// started_at. Narrow on purpose: it only has to absorb one play instance
/// being finalized twice, not cross-path duplicates.
const SAME_SESSION_DEDUPE_SECS: i64 = 5;

pub struct SessionEngine {
    config: PlaybackConfig,
    accounts: AccountsRepository,
    sessions: SessionRepository,
    scrobbles: ScrobbleRepository,
    store: CanonicalStore,
    resolver: std::sync::Arc<MetadataResolver>,
    player: PlayerClient,
    tokens: std::sync::Arc<TokenClient>,
}

impl SessionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PlaybackConfig,
        accounts: AccountsRepository,
        sessions: SessionRepository,
        scrobbles: ScrobbleRepository,
        store: CanonicalStore,
        resolver: std::sync::Arc<MetadataResolver>,
        player: PlayerClient,
        tokens: std::sync::Arc<TokenClient>,
    ) -> Self {
        Self {
            config,
            accounts,
            sessions,
            scrobbles,
            store,
            resolver,
            player,
            tokens,
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// One poll for one account: fetch the currently-playing snapshot and
    /// feed it through the state machine.
    pub async fn poll_account(&self, account: &Account) -> Result<()> {
        let token = self
            .tokens
            .get_valid_access_token(&self.accounts, account)
            .await?;
        let outcome = self.player.currently_playing(&token).await?;
        self.apply_poll(account.user_id, &account.provider, outcome)
            .await
    }

    /// The transition table. Public so tests can drive the machine with
    /// synthetic snapshots instead of a live provider.
    pub async fn apply_poll(
        &self,
        user_id: UserId,
        provider: &str,
        outcome: PollOutcome,
    ) -> Result<()> {
        let session = self.sessions.get(user_id, provider).await?;

        match (outcome, session) {
            (PollOutcome::NoContent | PollOutcome::NotATrack, None) => Ok(()),
            (PollOutcome::NoContent | PollOutcome::NotATrack, Some(session)) => {
                if session.is_stale(chrono::Utc::now(), self.config.stale_session_ms) {
                    debug!(user = %user_id, uri = %session.track_uri,
                           "finalizing stale session");
                    self.finalize(&session).await?;
                    self.sessions.delete(user_id, provider).await?;
                }
                // Otherwise keep the row; the user may resume.
                Ok(())
            }
            (PollOutcome::Track(snapshot), None) => {
                self.sessions
                    .save(&new_session(user_id, provider, &snapshot))
                    .await
            }
            (PollOutcome::Track(snapshot), Some(session)) => {
                if snapshot.uri == session.track_uri {
                    self.continue_session(session, &snapshot).await
                } else {
                    if !session.scrobbled {
                        self.finalize(&session).await?;
                    }
                    self.sessions
                        .save(&new_session(user_id, provider, &snapshot))
                        .await
                }
            }
        }
    }

    async fn continue_session(
        &self,
        mut session: PlaybackSession,
        snapshot: &TrackSnapshot,
    ) -> Result<()> {
        let duration = session.track_duration_ms.or(snapshot.duration_ms);
        let delta = snapshot.progress_ms - session.last_progress_ms;
        let action =
            engine::continuation_action(session.is_playing, delta, duration, &self.config);

        match action {
            ContinuationAction::Wrap => {
                debug!(user = %session.user_id, uri = %session.track_uri, delta,
                       "wrap detected, finalizing looped play");
                if !session.scrobbled {
                    self.finalize(&session).await?;
                }
                self.sessions
                    .save(&new_session(session.user_id, &session.provider, snapshot))
                    .await
            }
            ContinuationAction::Advance(credit) => {
                session.accumulated_ms += credit;
                update_position(&mut session, snapshot);
                self.sessions.save(&session).await
            }
            ContinuationAction::Hold => {
                update_position(&mut session, snapshot);
                self.sessions.save(&session).await
            }
        }
    }

    /// Turn a finished session into (at most) one scrobble.
    async fn finalize(&self, session: &PlaybackSession) -> Result<bool> {
        if session.scrobbled {
            return Ok(false);
        }
        let Some(metadata) = session.track_metadata.clone() else {
            warn!(user = %session.user_id, uri = %session.track_uri,
                  "session has no metadata snapshot, cannot scrobble");
            return Ok(false);
        };
        let track: TrackObject = match serde_json::from_value(metadata) {
            Ok(t) => t,
            Err(e) => {
                warn!(user = %session.user_id, uri = %session.track_uri, error = %e,
                      "session metadata snapshot unparseable");
                return Ok(false);
            }
        };

        let duration = session.track_duration_ms.or(Some(track.duration_ms));
        if !engine::meets_threshold(session.accumulated_ms, duration, &self.config) {
            debug!(user = %session.user_id, uri = %session.track_uri,
                   accumulated_ms = session.accumulated_ms,
                   "below scrobble threshold, dropping");
            return Ok(false);
        }

        let effective =
            engine::effective_duration_ms(session.accumulated_ms, duration, &self.config);
        let skipped = engine::is_skipped(effective, duration, &self.config);

        // One play instance must not scrobble twice even if finalization
        // races pause/resume; started_at is stable across the instance.
        if self
            .scrobbles
            .exists_near(
                session.user_id,
                &session.provider,
                session.started_at,
                Duration::seconds(SAME_SESSION_DEDUPE_SECS),
            )
            .await?
        {
            debug!(user = %session.user_id, uri = %session.track_uri,
                   "scrobble already recorded for this session window");
            return Ok(false);
        }

        let meta = self.resolver.resolve_play(&track).await;
        let upserted = self.store.upsert_play(&meta).await?;

        let inserted = self
            .scrobbles
            .insert(&NewScrobble {
                user_id: session.user_id,
                track_id: upserted.track.id,
                album_id: upserted.album.as_ref().map(|a| a.id),
                played_at: session.started_at,
                played_duration_ms: effective,
                skipped,
                provider: session.provider.clone(),
                import_batch_id: None,
            })
            .await?;

        if inserted.is_some() {
            info!(user = %session.user_id, track = %upserted.track.title,
                  played_ms = effective, skipped, "scrobbled");
            self.sessions
                .mark_scrobbled(session.user_id, &session.provider)
                .await?;
        }
        Ok(inserted.is_some())
    }
}

fn new_session(user_id: UserId, provider: &str, snapshot: &TrackSnapshot) -> PlaybackSession {
    PlaybackSession {
        user_id,
        provider: provider.to_string(),
        track_uri: snapshot.uri.clone(),
        started_at: snapshot.observed_at,
        last_seen_at: snapshot.observed_at,
        last_progress_ms: snapshot.progress_ms,
        accumulated_ms: 0,
        is_playing: snapshot.is_playing,
        track_duration_ms: snapshot.duration_ms,
        track_metadata: Some(snapshot.metadata.clone()),
        scrobbled: false,
    }
}

fn update_position(session: &mut PlaybackSession, snapshot: &TrackSnapshot) {
    session.last_seen_at = snapshot.observed_at;
    session.last_progress_ms = snapshot.progress_ms;
    session.is_playing = snapshot.is_playing;
    if session.track_duration_ms.is_none() {
        session.track_duration_ms = snapshot.duration_ms;
    }
}
