//! Shared helpers for infra integration tests

use std::sync::Arc;

use campline_infra::config::{CampusConfig, SpocConfig};
use campline_infra::database::{DbManager, SqliteScheduleStore};
use campline_infra::integrations::campus::{CampusPortalClient, ScheduleSyncService};
use campline_infra::integrations::spoc::SpocClient;
use campline_infra::SessionStore;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::MockServer;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = Arc::new(
            DbManager::new(db_path.to_str().expect("utf-8 path"), 4)
                .expect("db manager should be created"),
        );
        manager.run_migrations().expect("migrations should run");

        Self { manager, _temp_dir: temp_dir }
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.manager.get().expect("connection");
        conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))
            .expect("count query")
    }
}

/// Wire a sync service against a mock portal and an existing database.
pub fn build_sync_service(
    server: &MockServer,
    db: &TestDatabase,
) -> (ScheduleSyncService, Arc<SessionStore>) {
    let sessions = Arc::new(SessionStore::new());
    let campus_config = CampusConfig {
        api_base_url: format!("{}/jwapp/sys", server.uri()),
        ..Default::default()
    };

    let portal = Arc::new(CampusPortalClient::new(campus_config, sessions.clone()));
    let spoc = Arc::new(SpocClient::new(SpocConfig {
        base_url: server.uri(),
        sso_login_url: format!("{}/sso/login", server.uri()),
        ..Default::default()
    }));
    let store = Arc::new(SqliteScheduleStore::new(db.manager.clone()));

    (ScheduleSyncService::new(portal, spoc, store), sessions)
}

/// Standard success envelope of the first portal.
pub fn success_body(rows: Value) -> Value {
    json!({ "datas": rows, "code": "0", "msg": null })
}

/// A rich-shape schedule row.
pub fn rich_row(course: &str, weekday: u32, week_range: &str) -> Value {
    json!({
        "kcmc": course,
        "jsxm": "Dr. X",
        "jxlh": "Building A",
        "jash": "101",
        "kssj": "09:00",
        "jssj": "10:30",
        "xqj": weekday,
        "zcd": week_range,
    })
}
