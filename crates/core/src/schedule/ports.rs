//! Port interfaces for the schedule persistence layer
//!
//! These traits define the boundary between the reconciler and whatever
//! store backs it. All writes of one reconciliation pass happen inside a
//! single transaction: `with_transaction` commits when the closure returns
//! `Ok` and rolls the whole batch back otherwise.

use campline_domain::{
    CanonicalCalendarEntry, CanonicalCourseRecord, CourseKey, EntryKey, NewTask, Result,
};

/// Transactional handle over the schedule store.
pub trait ScheduleStore: Send + Sync {
    /// Run `work` inside one transaction. Any error aborts and rolls back
    /// every write made by the closure.
    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn ScheduleTxn) -> Result<()>,
    ) -> Result<()>;
}

/// Operations available inside a schedule transaction.
pub trait ScheduleTxn {
    /// Look up a persisted course by its identity key.
    fn find_course(&mut self, key: &CourseKey<'_>) -> Result<Option<i64>>;

    fn insert_course(&mut self, record: &CanonicalCourseRecord) -> Result<()>;

    /// The week range is the only mutable course field.
    fn update_course_week_range(&mut self, id: i64, week_range: &str) -> Result<()>;

    /// Look up a persisted calendar entry by its identity key.
    fn find_entry(&mut self, key: &EntryKey<'_>) -> Result<Option<i64>>;

    fn insert_entry(&mut self, entry: &CanonicalCalendarEntry) -> Result<()>;

    /// Refresh the mutable annotation fields of an existing entry.
    fn update_entry_annotations(&mut self, id: i64, description: &str, color: &str)
        -> Result<()>;

    /// Look up a task by title (the homework identity).
    fn find_task_by_title(&mut self, title: &str) -> Result<Option<i64>>;

    fn insert_task(&mut self, task: &NewTask) -> Result<()>;
}
