//! Schedule fetch and sync commands

use campline_domain::constants::DEFAULT_SYNC_DAYS;
use campline_domain::{FetchOutcome, Result, SyncOutcome};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use crate::AppContext;

/// Raw daily course schedule for `date`.
pub async fn fetch_course_schedule(
    ctx: &AppContext,
    user_key: &str,
    date: NaiveDate,
) -> Result<FetchOutcome<Vec<Value>>> {
    ctx.portal.fetch_course_schedule(user_key, date).await
}

/// Raw exam listing for the term containing `date`.
pub async fn fetch_exam_schedule(
    ctx: &AppContext,
    user_key: &str,
    date: NaiveDate,
) -> Result<FetchOutcome<Vec<Value>>> {
    ctx.portal.fetch_exam_schedule(user_key, date).await
}

/// Fetch and reconcile a multi-day window. `days` defaults to a week.
pub async fn sync_window(
    ctx: &AppContext,
    user_key: &str,
    start_date: NaiveDate,
    days: Option<u32>,
) -> Result<FetchOutcome<SyncOutcome>> {
    let days = days.unwrap_or(DEFAULT_SYNC_DAYS);
    info!(command = "schedule::sync_window", user_key, %start_date, days, "starting sync window");
    ctx.sync.sync_window(user_key, start_date, days).await
}
