//! SQLite implementation of the schedule persistence ports
//!
//! One reconciliation pass maps to one rusqlite transaction: the closure's
//! error aborts the transaction and every write in it rolls back.

use std::sync::Arc;

use campline_domain::{
    CanonicalCalendarEntry, CanonicalCourseRecord, CourseKey, EntryKey, NewTask, Result,
};
use campline_core::{ScheduleStore, ScheduleTxn};
use chrono::{NaiveDateTime, NaiveTime};
use rusqlite::{params, Transaction};

use crate::errors::InfraError;

use super::manager::DbManager;

/// Store backed by the pooled SQLite database.
pub struct SqliteScheduleStore {
    db: Arc<DbManager>,
}

impl SqliteScheduleStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn with_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn ScheduleTxn) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction().map_err(InfraError::from)?;
        {
            let mut txn = SqliteScheduleTxn { tx: &tx };
            work(&mut txn)?;
        }
        tx.commit().map_err(InfraError::from)?;
        Ok(())
    }
}

struct SqliteScheduleTxn<'a> {
    tx: &'a Transaction<'a>,
}

fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn fmt_datetime(datetime: NaiveDateTime) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn optional_id(result: rusqlite::Result<i64>) -> Result<Option<i64>> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(InfraError::from(err).into()),
    }
}

impl ScheduleTxn for SqliteScheduleTxn<'_> {
    fn find_course(&mut self, key: &CourseKey<'_>) -> Result<Option<i64>> {
        optional_id(self.tx.query_row(
            "SELECT id FROM courses
             WHERE course_name = ?1 AND teacher = ?2 AND classroom = ?3
               AND start_time = ?4 AND end_time = ?5 AND day_of_week = ?6",
            params![
                key.course_name,
                key.teacher,
                key.classroom,
                fmt_time(key.start_time),
                fmt_time(key.end_time),
                i64::from(key.day_of_week),
            ],
            |row| row.get(0),
        ))
    }

    fn insert_course(&mut self, record: &CanonicalCourseRecord) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO courses
                    (course_name, teacher, classroom, start_time, end_time, day_of_week, week_range)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.course_name,
                    record.teacher,
                    record.classroom,
                    fmt_time(record.start_time),
                    fmt_time(record.end_time),
                    i64::from(record.day_of_week),
                    record.week_range,
                ],
            )
            .map_err(InfraError::from)?;
        Ok(())
    }

    fn update_course_week_range(&mut self, id: i64, week_range: &str) -> Result<()> {
        self.tx
            .execute(
                "UPDATE courses SET week_range = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![week_range, id],
            )
            .map_err(InfraError::from)?;
        Ok(())
    }

    fn find_entry(&mut self, key: &EntryKey<'_>) -> Result<Option<i64>> {
        optional_id(self.tx.query_row(
            "SELECT id FROM entries
             WHERE title = ?1 AND entry_type = ?2 AND start_time = ?3 AND end_time = ?4",
            params![
                key.title,
                key.kind.as_str(),
                fmt_datetime(key.start),
                fmt_datetime(key.end),
            ],
            |row| row.get(0),
        ))
    }

    fn insert_entry(&mut self, entry: &CanonicalCalendarEntry) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO entries (title, description, entry_type, start_time, end_time, color)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.title,
                    entry.description,
                    entry.kind.as_str(),
                    fmt_datetime(entry.start),
                    fmt_datetime(entry.end),
                    entry.color,
                ],
            )
            .map_err(InfraError::from)?;
        Ok(())
    }

    fn update_entry_annotations(
        &mut self,
        id: i64,
        description: &str,
        color: &str,
    ) -> Result<()> {
        self.tx
            .execute(
                "UPDATE entries SET description = ?1, color = ?2, updated_at = datetime('now')
                 WHERE id = ?3",
                params![description, color, id],
            )
            .map_err(InfraError::from)?;
        Ok(())
    }

    fn find_task_by_title(&mut self, title: &str) -> Result<Option<i64>> {
        optional_id(self.tx.query_row(
            "SELECT id FROM tasks WHERE title = ?1",
            params![title],
            |row| row.get(0),
        ))
    }

    fn insert_task(&mut self, task: &NewTask) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO tasks (title, description, task_type, deadline, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task.title,
                    task.description,
                    task.task_type,
                    task.deadline.map(fmt_datetime),
                    task.priority,
                ],
            )
            .map_err(InfraError::from)?;
        Ok(())
    }
}
