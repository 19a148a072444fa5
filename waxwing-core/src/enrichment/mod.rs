//! Enrichment: the worker that drains the job queue and the membership
//! reconciliation rules it applies.

pub mod membership;
pub mod worker;

pub use worker::EnrichmentWorker;
