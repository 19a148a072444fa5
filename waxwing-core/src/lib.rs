//! # Waxwing Core
//!
//! Domain model, Postgres persistence, and the three engines behind the
//! Waxwing scrobbler:
//!
//! - the **playback session engine**, a per-account state machine over
//!   polled currently-playing snapshots;
//! - the **recently-played reconciler**, a slower safety net that backfills
//!   plays the fast loop missed;
//! - the **enrichment pipeline**, a database-backed job queue plus a
//!   rate-limited worker that resolves MusicBrainz identifiers, syncs
//!   metadata, and maintains group/member relationships.

pub mod config;
pub mod coverart;
pub mod database;
pub mod dates;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod musicbrainz;
pub mod playback;
pub mod provider;
pub mod reconciler;
pub mod resolver;
pub mod store;
pub mod types;
pub mod util;

pub use database::{Database, MIGRATOR};
pub use error::{CoreError, Result};
