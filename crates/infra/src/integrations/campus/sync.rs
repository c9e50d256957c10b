//! Schedule sync worker
//!
//! Orchestrates a bounded multi-day fetch window against the first portal,
//! funnels the rows through the reconciler, and merges homework from the
//! encrypted portal into tasks. The per-day pacing delay is a deliberate
//! rate limit on the remote portal, not an optimization.

use std::sync::Arc;

use campline_core::schedule::reconciler::{classify_rows, dedupe, exam_entries, normalize};
use campline_core::{ScheduleReconciler, ScheduleStore};
use campline_domain::constants::SYNC_PACING;
use campline_domain::{FetchOutcome, RawExamRecord, Result, SyncOutcome};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::integrations::spoc::SpocClient;

use super::client::CampusPortalClient;

/// Result of a homework-to-task sync.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HomeworkSyncOutcome {
    /// Records reported by the portal
    pub total: u64,
    /// Tasks created locally
    pub created: usize,
    /// A bootstrap fallback path was taken while fetching
    pub degraded: bool,
}

/// Sync worker owning the portal clients and the reconciler.
pub struct ScheduleSyncService {
    portal: Arc<CampusPortalClient>,
    spoc: Arc<SpocClient>,
    reconciler: ScheduleReconciler,
}

impl ScheduleSyncService {
    pub fn new(
        portal: Arc<CampusPortalClient>,
        spoc: Arc<SpocClient>,
        store: Arc<dyn ScheduleStore>,
    ) -> Self {
        Self { portal, spoc, reconciler: ScheduleReconciler::new(store) }
    }

    /// Fetch `days` consecutive daily schedules starting at `start_date`,
    /// plus one exam listing, and reconcile everything in one transaction.
    ///
    /// A failed day is skipped (the rest of the window still syncs); a
    /// need-login outcome aborts, since every later day would fail the same
    /// way.
    #[instrument(skip(self), fields(user_key))]
    pub async fn sync_window(
        &self,
        user_key: &str,
        start_date: NaiveDate,
        days: u32,
    ) -> Result<FetchOutcome<SyncOutcome>> {
        let days = days.max(1);

        let (logged_in, login_url) = self.portal.check_login_status(user_key, start_date).await;
        if !logged_in {
            return Ok(FetchOutcome::NeedLogin { login_url });
        }

        let mut collected = Vec::new();
        for offset in 0..days {
            let date = start_date + chrono::Duration::days(i64::from(offset));

            match self.portal.fetch_course_schedule(user_key, date).await {
                Ok(FetchOutcome::Data(rows)) => {
                    let normalized = normalize(classify_rows(&rows), date);
                    debug!(%date, fetched = rows.len(), kept = normalized.len(), "fetched daily schedule");
                    collected.extend(normalized);
                }
                Ok(FetchOutcome::NeedLogin { login_url }) => {
                    warn!(%date, "session rejected mid-window");
                    return Ok(FetchOutcome::NeedLogin { login_url });
                }
                Err(err) => {
                    warn!(%date, %err, "skipping day after fetch failure");
                }
            }

            // fixed pacing between calls so the portal is not hammered
            tokio::time::sleep(SYNC_PACING).await;
        }

        let courses = dedupe(collected);

        // one exam fetch per window; exam failures never sink the course sync
        let exams = match self.portal.fetch_exam_schedule(user_key, start_date).await {
            Ok(FetchOutcome::Data(rows)) => {
                let raw: Vec<RawExamRecord> = rows
                    .into_iter()
                    .filter_map(|row| serde_json::from_value(row).ok())
                    .collect();
                exam_entries(&raw)
            }
            Ok(FetchOutcome::NeedLogin { .. }) => {
                warn!("exam fetch rejected, syncing courses only");
                Vec::new()
            }
            Err(err) => {
                warn!(%err, "exam fetch failed, syncing courses only");
                Vec::new()
            }
        };

        let counts = self.reconciler.apply(&courses, &exams)?;
        info!(
            courses = courses.len(),
            exams = exams.len(),
            ?counts,
            "sync window reconciled"
        );

        Ok(FetchOutcome::Data(SyncOutcome { courses, exams, counts }))
    }

    /// Fetch every homework record from the encrypted portal and insert a
    /// task for each one not seen before.
    pub async fn sync_homeworks(&self, username: &str, password: &str) -> Result<HomeworkSyncOutcome> {
        let fetch = self.spoc.fetch_all_homeworks(username, password).await?;
        let created = self.reconciler.reconcile_homeworks(&fetch.homeworks)?;

        info!(total = fetch.total, created, degraded = fetch.degraded, "homework sync completed");

        Ok(HomeworkSyncOutcome { total: fetch.total, created, degraded: fetch.degraded })
    }
}
