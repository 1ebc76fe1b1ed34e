//! Application state wiring all services together.
//!
//! AppState holds the concrete store, registry, and coordinator instances
//! used by both CLI commands and REST API handlers. The coordinator is
//! generic over repository traits, but AppState pins it to the SQLite
//! infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use fermata_core::resume::ResumeCoordinator;
use fermata_infra::config::{GlobalConfig, default_data_dir, load_global_config};
use fermata_infra::sqlite::pause::SqlitePauseStore;
use fermata_infra::sqlite::pool::DatabasePool;
use fermata_infra::sqlite::runs::SqliteRunSink;
use fermata_infra::sqlite::wait::SqliteWaitRegistry;

use crate::handler::PassthroughHandler;

/// Coordinator generics pinned to the SQLite infra implementations.
pub type ConcreteCoordinator =
    ResumeCoordinator<SqlitePauseStore, SqliteWaitRegistry, SqliteRunSink, PassthroughHandler>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqlitePauseStore>,
    pub registry: Arc<SqliteWaitRegistry>,
    pub runs: Arc<SqliteRunSink>,
    pub coordinator: Arc<ConcreteCoordinator>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = default_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;

        let db_url = match &config.database_url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}?mode=rwc",
                data_dir.join("fermata.db").display()
            ),
        };
        let db_pool = DatabasePool::new(&db_url).await?;

        let store = Arc::new(SqlitePauseStore::new(
            db_pool.clone(),
            config.base_url.clone(),
        ));
        let registry = Arc::new(SqliteWaitRegistry::new(db_pool.clone()));
        let runs = Arc::new(SqliteRunSink::new(db_pool.clone()));

        let coordinator = Arc::new(ResumeCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&runs),
            Arc::new(PassthroughHandler),
            config.base_url.clone(),
        ));

        Ok(Self {
            store,
            registry,
            runs,
            coordinator,
            config,
            data_dir,
            db_pool,
        })
    }
}
