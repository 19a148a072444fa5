//! Recently-played reconciler: the slow safety net behind the session
//! engine. Pulls provider history after the per-account cursor, estimates
//! how long each play actually ran from inter-arrival gaps, and backfills
//! scrobbles the fast loop missed.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::{PlaybackConfig, ReconcilerConfig};
use crate::database::{
    AccountsRepository, CursorRepository, ScrobbleRepository,
};
use crate::error::Result;
use crate::model::scrobble::NewScrobble;
use crate::model::Account;
use crate::playback::engine;
use crate::provider::dto::PlayHistoryItem;
use crate::provider::{PlayerClient, TokenClient};
use crate::resolver::MetadataResolver;
use crate::store::CanonicalStore;

pub struct Reconciler {
    config: ReconcilerConfig,
    playback_config: PlaybackConfig,
    accounts: AccountsRepository,
    cursors: CursorRepository,
    scrobbles: ScrobbleRepository,
    store: CanonicalStore,
    resolver: std::sync::Arc<MetadataResolver>,
    player: PlayerClient,
    tokens: std::sync::Arc<TokenClient>,
}

/// One play with its estimated listen time.
#[derive(Clone, Debug)]
struct EstimatedPlay {
    item: PlayHistoryItem,
    estimated_ms: i64,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ReconcilerConfig,
        playback_config: PlaybackConfig,
        accounts: AccountsRepository,
        cursors: CursorRepository,
        scrobbles: ScrobbleRepository,
        store: CanonicalStore,
        resolver: std::sync::Arc<MetadataResolver>,
        player: PlayerClient,
        tokens: std::sync::Arc<TokenClient>,
    ) -> Self {
        Self {
            config,
            playback_config,
            accounts,
            cursors,
            scrobbles,
            store,
            resolver,
            player,
            tokens,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// One reconciliation pass for one account. Returns how many scrobbles
    /// were backfilled.
    pub async fn reconcile_account(&self, account: &Account) -> Result<u32> {
        let token = self
            .tokens
            .get_valid_access_token(&self.accounts, account)
            .await?;

        let cursor = self.cursors.get(account.user_id, &account.provider).await?;
        let after_ms = cursor.map(|c| c.timestamp_millis());

        let items = self
            .player
            .recently_played(&token, after_ms, self.config.fetch_limit)
            .await?;
        if items.is_empty() {
            return Ok(0);
        }

        // Items arrive ascending from the client; drop anything at or
        // before the cursor that the provider returned anyway.
        let items: Vec<PlayHistoryItem> = items
            .into_iter()
            .filter(|item| cursor.map(|c| item.played_at > c).unwrap_or(true))
            .collect();
        if items.is_empty() {
            return Ok(0);
        }

        let max_played_at = match items.last() {
            Some(item) => item.played_at,
            None => return Ok(0),
        };
        let estimated = estimate_durations(items);

        let mut inserted = 0u32;
        for play in &estimated {
            if !engine::meets_threshold(
                play.estimated_ms,
                Some(play.item.track.duration_ms),
                &self.playback_config,
            ) {
                debug!(track = %play.item.track.name, estimated_ms = play.estimated_ms,
                       "reconciled play below threshold, skipping");
                continue;
            }
            if self.backfill_play(account, play).await? {
                inserted += 1;
            }
        }

        // The cursor tracks history processed, not history scrobbled:
        // below-threshold plays can never become eligible later.
        self.cursors
            .advance(account.user_id, &account.provider, max_played_at)
            .await?;

        if inserted > 0 {
            info!(user = %account.user_id, inserted, "reconciler backfilled scrobbles");
        }
        Ok(inserted)
    }

    /// Canonicalize and insert one eligible play unless a scrobble for the
    /// same (user, track) already sits inside the dedupe window. The upsert
    /// runs either way so track/artist/album links exist even for
    /// duplicates the fast loop already recorded.
    async fn backfill_play(&self, account: &Account, play: &EstimatedPlay) -> Result<bool> {
        let meta = self.resolver.resolve_play(&play.item.track).await;
        let upserted = self.store.upsert_play(&meta).await?;

        let window = Duration::seconds(self.config.dedupe_window_secs);
        if self
            .scrobbles
            .exists_near_track(account.user_id, upserted.track.id, play.item.played_at, window)
            .await?
        {
            debug!(user = %account.user_id, track = %upserted.track.title,
                   "play already scrobbled inside dedupe window");
            return Ok(false);
        }

        let duration = Some(play.item.track.duration_ms);
        let skipped = engine::is_skipped(play.estimated_ms, duration, &self.playback_config);

        let inserted = self
            .scrobbles
            .insert(&NewScrobble {
                user_id: account.user_id,
                track_id: upserted.track.id,
                album_id: upserted.album.as_ref().map(|a| a.id),
                played_at: play.item.played_at,
                played_duration_ms: play.estimated_ms,
                skipped,
                provider: account.provider.clone(),
                import_batch_id: None,
            })
            .await?;
        Ok(inserted.is_some())
    }
}

/// Estimate listen time per play from inter-arrival gaps: a play can have
/// run at most until the next one started, and never longer than the track
/// itself. The newest play has no successor and gets the full duration.
fn estimate_durations(items: Vec<PlayHistoryItem>) -> Vec<EstimatedPlay> {
    let played_ats: Vec<DateTime<Utc>> = items.iter().map(|i| i.played_at).collect();
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let track_ms = item.track.duration_ms;
            let estimated_ms = match played_ats.get(index + 1) {
                Some(next) => {
                    let gap = (*next - played_ats[index]).num_milliseconds();
                    track_ms.min(gap.max(0))
                }
                None => track_ms,
            };
            EstimatedPlay { item, estimated_ms }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::dto::TrackObject;
    use chrono::TimeZone;

    fn item(name: &str, duration_ms: i64, played_at: DateTime<Utc>) -> PlayHistoryItem {
        PlayHistoryItem {
            track: TrackObject {
                id: None,
                uri: format!("spotify:track:{name}"),
                name: name.to_string(),
                duration_ms,
                explicit: false,
                artists: Vec::new(),
                album: None,
                external_ids: None,
            },
            played_at,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn gap_bounds_the_estimate() {
        let plays = estimate_durations(vec![
            item("a", 240_000, at(0)),
            item("b", 180_000, at(90)),
            item("c", 200_000, at(600)),
        ]);
        // a ran at most 90s before b started.
        assert_eq!(plays[0].estimated_ms, 90_000);
        // b's gap (510s) exceeds its duration; duration wins.
        assert_eq!(plays[1].estimated_ms, 180_000);
        // The newest play gets its full duration.
        assert_eq!(plays[2].estimated_ms, 200_000);
    }

    #[test]
    fn clock_skew_never_goes_negative() {
        let plays = estimate_durations(vec![
            item("a", 240_000, at(10)),
            item("b", 180_000, at(10)),
        ]);
        assert_eq!(plays[0].estimated_ms, 0);
    }
}
