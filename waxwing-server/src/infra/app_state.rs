//! Shared application state: database, engines, and provider clients wired
//! together once at startup and cloned into handlers and loop tasks.

use std::fmt;
use std::sync::Arc;

use waxwing_core::coverart::CoverArtClient;
use waxwing_core::enrichment::EnrichmentWorker;
use waxwing_core::musicbrainz::MusicBrainzClient;
use waxwing_core::playback::SessionEngine;
use waxwing_core::provider::{PlayerClient, TokenClient};
use waxwing_core::reconciler::Reconciler;
use waxwing_core::resolver::MetadataResolver;
use waxwing_core::store::CanonicalStore;
use waxwing_core::Database;

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: Database,
    tokens: Arc<TokenClient>,
    player: PlayerClient,
    engine: Arc<SessionEngine>,
    reconciler: Arc<Reconciler>,
    worker: Arc<EnrichmentWorker>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config, db: Database) -> anyhow::Result<Self> {
        let resolver = Arc::new(MetadataResolver::new(
            MusicBrainzClient::new(config.musicbrainz.clone())?,
            CoverArtClient::new(&config.musicbrainz)?,
        ));
        let tokens = Arc::new(TokenClient::new(config.spotify.clone())?);
        let player = PlayerClient::new(&config.spotify)?;
        let store = CanonicalStore::new(db.catalog().clone(), db.jobs().clone());

        let engine = Arc::new(SessionEngine::new(
            config.playback.clone(),
            db.accounts().clone(),
            db.sessions().clone(),
            db.scrobbles().clone(),
            store.clone(),
            resolver.clone(),
            PlayerClient::new(&config.spotify)?,
            tokens.clone(),
        ));

        let reconciler = Arc::new(Reconciler::new(
            config.reconciler.clone(),
            config.playback.clone(),
            db.accounts().clone(),
            db.cursors().clone(),
            db.scrobbles().clone(),
            store.clone(),
            resolver.clone(),
            PlayerClient::new(&config.spotify)?,
            tokens.clone(),
        ));

        let worker = Arc::new(EnrichmentWorker::new(
            format!("waxwing-{}", uuid::Uuid::new_v4()),
            config.worker.clone(),
            db.catalog().clone(),
            db.memberships().clone(),
            db.jobs().clone(),
            store.clone(),
            resolver,
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                tokens,
                player,
                engine,
                reconciler,
                worker,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn tokens(&self) -> &Arc<TokenClient> {
        &self.inner.tokens
    }

    pub fn player(&self) -> &PlayerClient {
        &self.inner.player
    }

    pub fn engine(&self) -> &Arc<SessionEngine> {
        &self.inner.engine
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.inner.reconciler
    }

    pub fn worker(&self) -> &Arc<EnrichmentWorker> {
        &self.inner.worker
    }
}
