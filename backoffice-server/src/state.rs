//! Application state for backoffice-server

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{MemorySessionStore, SessionStore};
use crate::config::Config;
use crate::db;
use crate::loyalty::{LoyaltyService, LoyaltyWorker};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const LOYALTY_QUEUE_SIZE: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Admin session store (bearer tokens and 2FA flow state)
    pub sessions: Arc<dyn SessionStore>,
    /// Handle for queuing post-commit points accrual
    pub loyalty: Arc<LoyaltyService>,
    pub environment: String,
}

impl AppState {
    /// Create a new AppState: connect, migrate, seed the default admin and
    /// start the loyalty worker.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        db::admin::seed_default_admin(&pool, &config.admin_username, &config.admin_password)
            .await?;

        let (loyalty, rx) = LoyaltyService::new(LOYALTY_QUEUE_SIZE);
        tokio::spawn(LoyaltyWorker::new(pool.clone()).run(rx));

        Ok(Self {
            pool,
            sessions: Arc::new(MemorySessionStore::default()),
            loyalty,
            environment: config.environment.clone(),
        })
    }
}
