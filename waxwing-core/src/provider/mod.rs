//! Streaming-provider (Spotify) client surface: token lifecycle and the
//! player endpoints the two ingestion loops poll.

pub mod dto;
pub mod player;
pub mod token;

pub use player::{PlayerClient, PollOutcome, TrackSnapshot};
pub use token::TokenClient;
