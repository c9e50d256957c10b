//! Session lifecycle commands

use campline_domain::{Result, SessionReport};
use chrono::NaiveDate;
use tracing::info;

use crate::AppContext;

/// Create (or replace) the portal session for an identity pair and return
/// its user key.
pub fn create_session(ctx: &AppContext, local_id: &str, external_id: &str) -> Result<String> {
    let user_key = ctx.sessions.create_session(local_id, external_id)?;
    info!(command = "sessions::create_session", user_key = %user_key, "session created");
    Ok(user_key)
}

/// Drop a session. Returns whether one existed.
pub fn destroy_session(ctx: &AppContext, user_key: &str) -> bool {
    let existed = ctx.sessions.destroy_session(user_key);
    info!(command = "sessions::destroy_session", user_key, existed, "session destroyed");
    existed
}

/// Status snapshot for a session key.
pub fn session_report(ctx: &AppContext, user_key: &str) -> SessionReport {
    ctx.sessions.session_report(user_key)
}

/// Run the SSO handshake for an existing session.
pub async fn login(
    ctx: &AppContext,
    user_key: &str,
    username: &str,
    password: &str,
    date: NaiveDate,
) -> Result<()> {
    info!(command = "sessions::login", user_key, username, "starting SSO login");
    ctx.portal.login(user_key, username, password, date).await
}

/// Probe the canary endpoint: `(logged_in, login_redirect_url)`.
pub async fn check_login_status(
    ctx: &AppContext,
    user_key: &str,
    date: NaiveDate,
) -> (bool, Option<String>) {
    ctx.portal.check_login_status(user_key, date).await
}

/// Conservative server-side session health probe.
pub async fn check_session_health(ctx: &AppContext, user_key: &str, date: NaiveDate) -> bool {
    let probe_url = ctx.config().campus.schedule_url(date);
    let sso_host = ctx.config().campus.sso_host.clone();
    ctx.sessions.check_health(user_key, &probe_url, &sso_host).await
}

/// Housekeeping sweep of idle-expired sessions.
pub fn clear_expired_sessions(ctx: &AppContext) -> usize {
    let cleared = ctx.sessions.clear_expired();
    if cleared > 0 {
        info!(command = "sessions::clear_expired_sessions", cleared, "expired sessions removed");
    }
    cleared
}
