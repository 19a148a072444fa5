//! Postgres persistence. One pool, one repository per aggregate.

pub mod accounts;
pub mod catalog;
pub mod cursors;
pub mod jobs;
pub mod memberships;
pub mod scrobbles;
pub mod sessions;
pub mod stats;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::fmt;
use tracing::info;

use crate::config::QueueConfig;
use crate::error::Result;

pub use accounts::AccountsRepository;
pub use catalog::CatalogRepository;
pub use cursors::CursorRepository;
pub use jobs::JobQueue;
pub use memberships::MembershipRepository;
pub use scrobbles::ScrobbleRepository;
pub use sessions::SessionRepository;
pub use stats::StatsRepository;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    accounts: AccountsRepository,
    catalog: CatalogRepository,
    cursors: CursorRepository,
    jobs: JobQueue,
    memberships: MembershipRepository,
    scrobbles: ScrobbleRepository,
    sessions: SessionRepository,
    stats: StatsRepository,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl Database {
    pub async fn connect(database_url: &str, queue_config: QueueConfig) -> Result<Self> {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or_else(|| num_cpus::get() as u32);
        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .test_before_acquire(true)
            // Every timestamp this crate writes or compares is UTC.
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET TIME ZONE 'UTC'").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        info!(max_connections, min_connections, "database pool initialized");
        Ok(Self::from_pool(pool, queue_config))
    }

    /// Build the repository set over an existing pool (tests hand one in).
    pub fn from_pool(pool: PgPool, queue_config: QueueConfig) -> Self {
        Self {
            accounts: AccountsRepository::new(pool.clone()),
            catalog: CatalogRepository::new(pool.clone()),
            cursors: CursorRepository::new(pool.clone()),
            jobs: JobQueue::new(pool.clone(), queue_config),
            memberships: MembershipRepository::new(pool.clone()),
            scrobbles: ScrobbleRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            stats: StatsRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn accounts(&self) -> &AccountsRepository {
        &self.accounts
    }

    pub fn catalog(&self) -> &CatalogRepository {
        &self.catalog
    }

    pub fn cursors(&self) -> &CursorRepository {
        &self.cursors
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn memberships(&self) -> &MembershipRepository {
        &self.memberships
    }

    pub fn scrobbles(&self) -> &ScrobbleRepository {
        &self.scrobbles
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    pub fn stats(&self) -> &StatsRepository {
        &self.stats
    }
}
