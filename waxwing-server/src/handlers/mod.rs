pub mod enrichment;
pub mod health;
pub mod playback;
pub mod stats;
