//! Session metadata types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of a stored portal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
    Invalid,
}

/// Snapshot of a session's state, safe to expose to the routing layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub exists: bool,
    pub status: Option<SessionStatus>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

impl SessionReport {
    /// Report for a key with no stored session.
    pub fn absent() -> Self {
        Self { exists: false, status: None, created_at: None, last_used: None }
    }
}
