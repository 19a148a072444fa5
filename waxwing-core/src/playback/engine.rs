//! Pure decision logic for the playback session state machine.
//!
//! Everything here is deterministic over a session row and a poll snapshot;
//! the DB-touching driver lives in `super::mod`. Keeping the rules pure is
//! what makes the transition table testable without a provider.

use crate::config::PlaybackConfig;

/// What a continuation poll (same track uri) does to the session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContinuationAction {
    /// Backward jump past the wrap threshold: the track restarted. The
    /// current session finalizes as one play and a fresh one begins.
    Wrap,
    /// Accumulate this many milliseconds of listening time.
    Advance(i64),
    /// Update position and flags only; no time is credited.
    Hold,
}

/// Decide what a same-uri poll means. Accumulation and wrap detection only
/// apply when the *previous* poll reported the track playing; a paused
/// session just tracks position.
pub fn continuation_action(
    was_playing: bool,
    delta_ms: i64,
    duration_ms: Option<i64>,
    config: &PlaybackConfig,
) -> ContinuationAction {
    if !was_playing {
        return ContinuationAction::Hold;
    }
    if delta_ms < -wrap_threshold_ms(duration_ms, config) {
        return ContinuationAction::Wrap;
    }
    if delta_ms > 0 {
        // A jump bigger than one poll interval can only be a seek; credit at
        // most the cap.
        return ContinuationAction::Advance(delta_ms.min(config.max_delta_ms));
    }
    ContinuationAction::Hold
}

/// Backward jumps smaller than this are scrubbing, not a loop.
pub fn wrap_threshold_ms(duration_ms: Option<i64>, config: &PlaybackConfig) -> i64 {
    let percent_based = duration_ms
        .map(|d| d * config.wrap_threshold_percent / 100)
        .unwrap_or(0);
    config.wrap_min_tolerance_ms.max(percent_based)
}

/// The scrobble threshold: an absolute floor in seconds, or a fraction of
/// the track. The disjunction keeps very short tracks scrobblable.
pub fn meets_threshold(
    accumulated_ms: i64,
    duration_ms: Option<i64>,
    config: &PlaybackConfig,
) -> bool {
    if accumulated_ms >= config.min_play_seconds * 1_000 {
        return true;
    }
    match duration_ms {
        Some(duration) if duration > 0 => {
            accumulated_ms * 100 >= duration * config.min_play_percent
        }
        _ => false,
    }
}

/// Accumulated time rounded up to the full duration when the listener got
/// within the end margin of finishing the track.
pub fn effective_duration_ms(
    accumulated_ms: i64,
    duration_ms: Option<i64>,
    config: &PlaybackConfig,
) -> i64 {
    match duration_ms {
        Some(duration) if accumulated_ms + config.end_margin_ms >= duration => duration,
        _ => accumulated_ms,
    }
}

/// A play that ended well short of the full track is marked skipped.
pub fn is_skipped(effective_ms: i64, duration_ms: Option<i64>, config: &PlaybackConfig) -> bool {
    match duration_ms {
        Some(duration) if duration > 0 => {
            effective_ms * 100 < duration * config.skip_threshold_percent
        }
        _ => false,
    }
}
