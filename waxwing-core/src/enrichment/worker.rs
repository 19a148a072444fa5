//! Enrichment worker: claims job batches and routes them by kind.
//!
//! Every handler is written to be safely re-runnable: the queue retries
//! failed jobs with backoff, and a crashed worker's claims are reclaimed by
//! lease expiry, so a job may execute more than once.

use tracing::{debug, info, warn};

use super::membership::{self, StintCandidate, StintDecision};
use crate::config::WorkerConfig;
use crate::database::{CatalogRepository, JobQueue, MembershipRepository};
use crate::dates;
use crate::error::{CoreError, Result};
use crate::model::catalog::{Artist, ArtistType};
use crate::model::job::{EnrichmentJob, JobKind};
use crate::resolver::MetadataResolver;
use crate::store::CanonicalStore;
use crate::types::{AlbumId, ArtistId, TrackId};
use crate::util;

pub struct EnrichmentWorker {
    worker_id: String,
    config: WorkerConfig,
    catalog: CatalogRepository,
    memberships: MembershipRepository,
    jobs: JobQueue,
    store: CanonicalStore,
    resolver: std::sync::Arc<MetadataResolver>,
}

impl EnrichmentWorker {
    pub fn new(
        worker_id: String,
        config: WorkerConfig,
        catalog: CatalogRepository,
        memberships: MembershipRepository,
        jobs: JobQueue,
        store: CanonicalStore,
        resolver: std::sync::Arc<MetadataResolver>,
    ) -> Self {
        Self {
            worker_id,
            config,
            catalog,
            memberships,
            jobs,
            store,
            resolver,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Claim one batch and drain it, pacing between jobs to stay under the
    /// upstream rate limit. Returns the number of jobs processed.
    pub async fn run_cycle(&self) -> Result<usize> {
        self.resolver.clear_cache();

        let batch = self
            .jobs
            .claim_batch(&self.worker_id, self.jobs.config().claim_batch_size)
            .await?;
        let count = batch.len();

        for (index, job) in batch.iter().enumerate() {
            match self.process(job).await {
                Ok(()) => {
                    debug!(job_id = %job.id, kind = %job.job_kind, "job succeeded");
                    self.jobs.complete(job).await?;
                }
                Err(e) => {
                    warn!(job_id = %job.id, kind = %job.job_kind, error = %e, "job failed");
                    self.jobs.fail(job, &e.to_string()).await?;
                }
            }
            if index + 1 < count {
                tokio::time::sleep(util::jittered_ms(self.config.job_delay_ms)).await;
            }
        }
        Ok(count)
    }

    async fn process(&self, job: &EnrichmentJob) -> Result<()> {
        match job.job_kind {
            JobKind::ArtistResolveMbid => self.resolve_artist_mbid(job.entity_id.into()).await,
            JobKind::ArtistSyncRelationships => {
                self.sync_artist_relationships(job.entity_id.into()).await
            }
            JobKind::AlbumResolveMbid => self.resolve_album_mbid(job.entity_id.into()).await,
            JobKind::AlbumSync => self.sync_album(job.entity_id.into()).await,
            JobKind::TrackResolveMbid => self.resolve_track_mbid(job.entity_id.into()).await,
            JobKind::TrackSync => self.sync_track(job.entity_id.into()).await,
        }
    }

    async fn resolve_artist_mbid(&self, id: ArtistId) -> Result<()> {
        let artist = self.require_artist(id).await?;
        if artist.mbid.is_some() {
            return Ok(());
        }

        let results = self.resolver.musicbrainz().search_artists(&artist.name).await?;
        let min_score = self.resolver.musicbrainz().min_search_score();
        match results.first() {
            Some(best) if best.score >= min_score => {
                info!(artist = %artist.name, mbid = %best.id, score = best.score,
                      "resolved artist mbid");
                self.store.attach_artist_mbid(artist.id, &best.id).await
            }
            Some(best) => Err(CoreError::NotFound(format!(
                "no confident match for artist '{}' (best score {})",
                artist.name, best.score
            ))),
            None => Err(CoreError::NotFound(format!(
                "no match for artist '{}'",
                artist.name
            ))),
        }
    }

    /// Sync group/member edges for an artist. For groups the relations list
    /// its members; for persons it lists the groups they belong to. Both
    /// endpoints are upserted before the edge.
    async fn sync_artist_relationships(&self, id: ArtistId) -> Result<()> {
        let artist = self.require_artist(id).await?;
        let mbid = artist.mbid.clone().ok_or_else(|| {
            CoreError::Precondition(format!("artist '{}' has no mbid", artist.name))
        })?;

        let details = self
            .resolver
            .musicbrainz()
            .lookup_artist_with_relations(&mbid)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("artist {mbid} not found in metadata service"))
            })?;

        let artist_type = details.artist_type.as_deref().and_then(ArtistType::parse);
        let life_span = details.life_span.clone().unwrap_or_default();
        self.catalog
            .update_artist_details(
                artist.id,
                artist_type,
                details.gender.as_deref(),
                life_span.begin.as_deref(),
                life_span.end.as_deref(),
            )
            .await?;

        let self_is_group = artist_type
            .map(|t| t.is_group_like())
            .unwrap_or_else(|| artist.is_group());

        let mut edges = 0usize;
        for relation in details.relations.iter().filter(|r| r.is_band_membership()) {
            let Some(counterpart_stub) = relation.artist.as_ref() else {
                continue;
            };
            let counterpart = self
                .store
                .upsert_artist(&counterpart_stub.name, Some(&counterpart_stub.id))
                .await?;
            if let Some(counterpart_type) = counterpart_stub
                .artist_type
                .as_deref()
                .and_then(ArtistType::parse)
            {
                self.catalog
                    .update_artist_details(counterpart.id, Some(counterpart_type), None, None, None)
                    .await?;
            }

            let (member_id, group_id) = if self_is_group {
                (counterpart.id, artist.id)
            } else {
                (artist.id, counterpart.id)
            };

            let candidate = StintCandidate::new(
                relation.begin.clone(),
                relation.end.clone(),
                relation.ended,
            );
            self.upsert_membership(member_id, group_id, &candidate).await?;
            edges += 1;
        }

        info!(artist = %artist.name, edges, "synced artist relationships");
        Ok(())
    }

    async fn upsert_membership(
        &self,
        member_id: ArtistId,
        group_id: ArtistId,
        candidate: &StintCandidate,
    ) -> Result<()> {
        let existing = self.memberships.list_stints(member_id, group_id).await?;
        match membership::decide(&existing, candidate) {
            StintDecision::NoChange => Ok(()),
            StintDecision::SetEnded { id, ended } => self.memberships.set_ended(id, ended).await,
            StintDecision::Update {
                id,
                begin_raw,
                end_raw,
                ended,
            } => {
                self.memberships
                    .update_stint(
                        id,
                        begin_raw.as_deref().and_then(dates::normalize),
                        end_raw.as_deref().and_then(dates::normalize),
                        begin_raw.as_deref(),
                        end_raw.as_deref(),
                        ended,
                    )
                    .await
            }
            StintDecision::Insert => {
                self.memberships
                    .insert_stint(
                        member_id,
                        group_id,
                        candidate.begin_raw.as_deref().and_then(dates::normalize),
                        candidate.end_raw.as_deref().and_then(dates::normalize),
                        candidate.begin_raw.as_deref(),
                        candidate.end_raw.as_deref(),
                        candidate.ended,
                    )
                    .await
            }
        }
    }

    async fn resolve_album_mbid(&self, id: AlbumId) -> Result<()> {
        let album = self
            .catalog
            .get_album(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("album {id} not found")))?;
        if album.mbid.is_some() {
            return Ok(());
        }
        let artist = self.require_artist(album.artist_id).await?;

        let results = self
            .resolver
            .musicbrainz()
            .search_releases(&album.title, &artist.name)
            .await?;
        let min_score = self.resolver.musicbrainz().min_search_score();
        match results.first() {
            Some(best) if best.score >= min_score => {
                info!(album = %album.title, mbid = %best.id, "resolved album mbid");
                self.catalog.attach_album_mbid(album.id, &best.id).await
            }
            _ => Err(CoreError::NotFound(format!(
                "no confident match for album '{}' by '{}'",
                album.title, artist.name
            ))),
        }
    }

    async fn sync_album(&self, id: AlbumId) -> Result<()> {
        let album = self
            .catalog
            .get_album(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("album {id} not found")))?;
        let mbid = album.mbid.clone().ok_or_else(|| {
            CoreError::Precondition(format!("album '{}' has no mbid", album.title))
        })?;

        let release = self
            .resolver
            .musicbrainz()
            .lookup_release(&mbid)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("release {mbid} not found in metadata service"))
            })?;

        let release_date = release.date.as_deref().and_then(dates::normalize);
        if release.title != album.title
            || (release_date.is_some() && release_date != album.release_date)
        {
            self.catalog
                .update_album_sync(album.id, &release.title, release_date)
                .await?;
        }

        if album.image_url.is_none() {
            if let Some(url) = self.resolver.cover_url(&mbid).await {
                self.catalog.set_album_image(album.id, &url).await?;
            }
        }
        Ok(())
    }

    async fn resolve_track_mbid(&self, id: TrackId) -> Result<()> {
        let track = self
            .catalog
            .get_track(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("track {id} not found")))?;
        if track.mbid.is_some() {
            return Ok(());
        }

        if let Some(isrc) = track.isrc.as_deref() {
            if let Some(recording_id) = self.resolver.recording_id_by_isrc(isrc).await? {
                info!(track = %track.title, mbid = %recording_id, "resolved track mbid via isrc");
                return self.catalog.attach_track_mbid(track.id, &recording_id).await;
            }
        }

        let primary = self
            .catalog
            .primary_artist_for_track(track.id)
            .await?
            .ok_or_else(|| {
                CoreError::Precondition(format!("track '{}' has no artist credits", track.title))
            })?;
        match self
            .resolver
            .recording_id_by_search(&track.title, &primary.name, None)
            .await?
        {
            Some(recording_id) => {
                info!(track = %track.title, mbid = %recording_id, "resolved track mbid via search");
                self.catalog.attach_track_mbid(track.id, &recording_id).await
            }
            None => Err(CoreError::NotFound(format!(
                "no match for track '{}' by '{}'",
                track.title, primary.name
            ))),
        }
    }

    async fn sync_track(&self, id: TrackId) -> Result<()> {
        let track = self
            .catalog
            .get_track(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("track {id} not found")))?;
        let mbid = track.mbid.clone().ok_or_else(|| {
            CoreError::Precondition(format!("track '{}' has no mbid", track.title))
        })?;

        let recording = self
            .resolver
            .recording_details(&mbid)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("recording {mbid} not found in metadata service"))
            })?;

        let new_isrc = if track.isrc.is_none() {
            recording.isrcs.first().map(String::as_str)
        } else {
            None
        };
        self.catalog
            .update_track_sync(track.id, &recording.title, recording.length, new_isrc)
            .await
    }

    async fn require_artist(&self, id: ArtistId) -> Result<Artist> {
        self.catalog
            .get_artist(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("artist {id} not found")))
    }
}
