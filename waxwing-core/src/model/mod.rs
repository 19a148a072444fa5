pub mod account;
pub mod catalog;
pub mod job;
pub mod scrobble;
pub mod session;
pub mod user;

pub use account::Account;
pub use catalog::{
    Album, Artist, ArtistCredit, ArtistType, GroupMembership, Track, TrackMetadata,
};
pub use job::{
    EnqueueOutcome, EnrichmentJob, EntityKind, JobKind, JobStatus, QueueStats,
};
pub use scrobble::Scrobble;
pub use session::PlaybackSession;
pub use user::{User, UserRole};
