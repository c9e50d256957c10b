//! Application context: explicit dependency wiring
//!
//! The process entry point builds one `AppContext` and hands it to the
//! routing layer. Everything downstream receives its collaborators through
//! this struct, which keeps lifetimes obvious and lets tests swap the
//! configuration for mock endpoints.

use std::sync::Arc;

use campline_core::ScheduleStore;
use campline_domain::Result;
use campline_infra::config::AppConfig;
use campline_infra::database::{DbManager, SqliteScheduleStore};
use campline_infra::integrations::campus::{CampusPortalClient, ScheduleSyncService};
use campline_infra::integrations::spoc::SpocClient;
use campline_infra::SessionStore;
use tracing::info;

/// Shared service graph for one process.
pub struct AppContext {
    config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub portal: Arc<CampusPortalClient>,
    pub spoc: Arc<SpocClient>,
    pub db: Arc<DbManager>,
    pub sync: ScheduleSyncService,
}

impl AppContext {
    /// Build the full graph: database (with schema), session store, portal
    /// clients and the sync service.
    pub fn new(config: AppConfig) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let sessions = Arc::new(SessionStore::new());
        let portal = Arc::new(CampusPortalClient::new(config.campus.clone(), sessions.clone()));
        let spoc = Arc::new(SpocClient::new(config.spoc.clone()));

        let store: Arc<dyn ScheduleStore> = Arc::new(SqliteScheduleStore::new(db.clone()));
        let sync = ScheduleSyncService::new(portal.clone(), spoc.clone(), store);

        info!(db_path = %config.database.path, "application context ready");

        Ok(Self { config, sessions, portal, spoc, db, sync })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
