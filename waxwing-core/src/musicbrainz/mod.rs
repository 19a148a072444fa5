//! MusicBrainz ws/2 client and wire types.

pub mod client;
pub mod dto;
pub mod lucene;

pub use client::MusicBrainzClient;
