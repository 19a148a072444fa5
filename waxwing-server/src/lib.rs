//! # Waxwing Server
//!
//! The Waxwing scrobbler binary: HTTP API plus the background runtime that
//! polls the streaming provider, reconciles recently-played history, and
//! drains the enrichment queue.
//!
//! The server is built on Axum and uses:
//! - PostgreSQL (sqlx) for persistent storage
//! - MusicBrainz / the Cover Art Archive for catalog enrichment
//! - The provider's Web API for playback state and history

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;
pub mod runtime;
