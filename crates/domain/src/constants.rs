//! Domain-wide constants

use std::time::Duration;

/// Idle timeout after which a portal session is considered expired.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Week range assumed for compact schedule rows that carry no week info.
pub const DEFAULT_WEEK_RANGE: &str = "1-16";

/// Calendar color for course entries.
pub const COURSE_ENTRY_COLOR: &str = "#4a90e2";

/// Calendar color for exam entries.
pub const EXAM_ENTRY_COLOR: &str = "#ff4444";

/// Placeholder teacher name when the remote row carries none.
pub const UNKNOWN_TEACHER: &str = "TBA";

/// Pacing delay between per-day schedule fetches in a sync window.
pub const SYNC_PACING: Duration = Duration::from_millis(200);

/// Number of days fetched by a default sync window.
pub const DEFAULT_SYNC_DAYS: u32 = 7;
