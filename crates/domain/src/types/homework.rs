//! Homework and task types for the encrypted portal sync

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One homework row from the encrypted portal's paginated query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeworkRecord {
    /// Course name
    #[serde(default)]
    pub kcmc: String,
    /// Assignment title
    #[serde(default)]
    pub zymc: String,
    /// Assignment details
    #[serde(default)]
    pub zyxq: String,
    /// Deadline, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
    #[serde(default)]
    pub zyjzsj: String,
}

impl HomeworkRecord {
    /// Task title used as the insert-if-absent identity.
    pub fn task_title(&self) -> String {
        format!("{}+{}", self.kcmc, self.zymc)
    }

    /// Parse the deadline, tolerating the date-only form.
    pub fn deadline(&self) -> Option<NaiveDateTime> {
        let raw = self.zyjzsj.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .or_else(|| {
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

/// A new task row derived from a homework record.
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub task_type: String,
    pub deadline: Option<NaiveDateTime>,
    pub priority: String,
}

impl From<&HomeworkRecord> for NewTask {
    fn from(hw: &HomeworkRecord) -> Self {
        Self {
            title: hw.task_title(),
            description: hw.zyxq.clone(),
            task_type: "homework".to_string(),
            deadline: hw.deadline(),
            priority: "medium".to_string(),
        }
    }
}
