//! Encrypted-portal homework commands

use campline_domain::Result;
use campline_infra::integrations::campus::HomeworkSyncOutcome;
use campline_infra::integrations::spoc::SpocFetch;
use tracing::info;

use crate::AppContext;

/// Authenticate against the encrypted portal. Returns whether a degraded
/// fallback path was taken.
pub async fn login_spoc(ctx: &AppContext, username: &str, password: &str) -> Result<bool> {
    info!(command = "homework::login_spoc", username, "starting spoc login");
    ctx.spoc.login(username, password).await
}

/// Log in and fetch every homework record.
pub async fn fetch_homeworks(
    ctx: &AppContext,
    username: &str,
    password: &str,
) -> Result<SpocFetch> {
    info!(command = "homework::fetch_homeworks", username, "fetching homework records");
    ctx.spoc.fetch_all_homeworks(username, password).await
}

/// Fetch homework records and reconcile them into tasks.
pub async fn sync_homeworks(
    ctx: &AppContext,
    username: &str,
    password: &str,
) -> Result<HomeworkSyncOutcome> {
    info!(command = "homework::sync_homeworks", username, "syncing homework records");
    ctx.sync.sync_homeworks(username, password).await
}
