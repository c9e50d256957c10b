//! Schedule reconciliation
//!
//! Turns raw portal rows into canonical records and merges them into the
//! store without duplication. Remote data is expected to be partially
//! malformed: rows that fail classification or validation are dropped and
//! logged, never partially stored. Re-running a pass over identical input
//! produces zero net change.

use std::collections::HashSet;
use std::sync::Arc;

use campline_domain::constants::{
    COURSE_ENTRY_COLOR, DEFAULT_WEEK_RANGE, EXAM_ENTRY_COLOR, UNKNOWN_TEACHER,
};
use campline_domain::{
    iso_weekday, parse_hhmm, CanonicalCalendarEntry, CanonicalCourseRecord, EntryKind,
    HomeworkRecord, NewTask, RawCompactCourse, RawCourseRecord, RawExamRecord, RawRichCourse,
    ReconcileCounts, Result,
};
use chrono::NaiveDate;
use tracing::{debug, warn};

use super::ports::ScheduleStore;

/// Classify raw JSON rows into the two known schedule shapes.
///
/// Rows matching neither shape are dropped here, before normalization ever
/// sees them.
pub fn classify_rows(rows: &[serde_json::Value]) -> Vec<RawCourseRecord> {
    rows.iter()
        .filter_map(|row| match serde_json::from_value::<RawCourseRecord>(row.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(%err, "dropping unclassifiable schedule row");
                None
            }
        })
        .collect()
}

/// Normalize classified rows for the given query date.
pub fn normalize(rows: Vec<RawCourseRecord>, query_date: NaiveDate) -> Vec<CanonicalCourseRecord> {
    rows.into_iter()
        .filter_map(|row| match row {
            RawCourseRecord::Rich(rich) => normalize_rich(rich, query_date),
            RawCourseRecord::Compact(compact) => normalize_compact(compact, query_date),
        })
        .collect()
}

fn normalize_rich(row: RawRichCourse, query_date: NaiveDate) -> Option<CanonicalCourseRecord> {
    if !(1..=7).contains(&row.xqj) {
        debug!(course = %row.kcmc, weekday = row.xqj, "dropping row with out-of-range weekday");
        return None;
    }

    let start_time = match parse_hhmm(&row.kssj) {
        Ok(t) => t,
        Err(err) => {
            debug!(course = %row.kcmc, %err, "dropping row with bad start time");
            return None;
        }
    };
    let end_time = match parse_hhmm(&row.jssj) {
        Ok(t) => t,
        Err(err) => {
            debug!(course = %row.kcmc, %err, "dropping row with bad end time");
            return None;
        }
    };

    let week_range = row.zcd.trim();
    if week_range.is_empty() {
        debug!(course = %row.kcmc, "dropping row with empty week range");
        return None;
    }

    Some(CanonicalCourseRecord {
        course_name: row.kcmc.trim().to_string(),
        teacher: row.jsxm.trim().to_string(),
        classroom: format!("{}{}", row.jxlh.trim(), row.jash.trim()),
        start_time,
        end_time,
        day_of_week: row.xqj as u8,
        week_range: week_range.to_string(),
        source_date: query_date,
    })
}

fn normalize_compact(
    row: RawCompactCourse,
    query_date: NaiveDate,
) -> Option<CanonicalCourseRecord> {
    let Some((start_raw, end_raw)) = row.time.split_once('-') else {
        debug!(course = %row.biz_name, time = %row.time, "dropping row with unsplittable time");
        return None;
    };

    let start_time = match parse_hhmm(start_raw) {
        Ok(t) => t,
        Err(err) => {
            debug!(course = %row.biz_name, %err, "dropping row with bad start time");
            return None;
        }
    };
    let end_time = match parse_hhmm(end_raw) {
        Ok(t) => t,
        Err(err) => {
            debug!(course = %row.biz_name, %err, "dropping row with bad end time");
            return None;
        }
    };

    let (course_name, teacher) = split_teacher(row.biz_name.trim());

    Some(CanonicalCourseRecord {
        course_name,
        teacher,
        classroom: row.place.trim().to_string(),
        start_time,
        end_time,
        day_of_week: iso_weekday(query_date),
        week_range: DEFAULT_WEEK_RANGE.to_string(),
        source_date: query_date,
    })
}

/// Best-effort teacher extraction from a parenthesized suffix of the display
/// name, e.g. `"Algorithms (Dr. X)"`. The compact shape has no teacher field
/// of its own.
fn split_teacher(name: &str) -> (String, String) {
    for (open, close) in [('(', ')'), ('（', '）')] {
        if let Some(stripped) = name.strip_suffix(close) {
            if let Some((head, inner)) = stripped.rsplit_once(open) {
                let teacher = inner.trim();
                if !teacher.is_empty() && !head.trim().is_empty() {
                    return (head.trim().to_string(), teacher.to_string());
                }
            }
        }
    }
    (name.to_string(), UNKNOWN_TEACHER.to_string())
}

/// Drop in-pass duplicates. The key includes the source date, so the same
/// class observed on different days survives to persistence (where date is
/// not part of the identity).
pub fn dedupe(records: Vec<CanonicalCourseRecord>) -> Vec<CanonicalCourseRecord> {
    let mut seen = HashSet::new();
    records.into_iter().filter(|r| seen.insert(r.dedupe_key())).collect()
}

/// Derive calendar entries from normalized course records.
pub fn course_entries(records: &[CanonicalCourseRecord]) -> Vec<CanonicalCalendarEntry> {
    records
        .iter()
        .map(|record| CanonicalCalendarEntry {
            title: record.course_name.clone(),
            description: format!("Teacher: {}\nRoom: {}", record.teacher, record.classroom),
            kind: EntryKind::Course,
            start: record.source_date.and_time(record.start_time),
            end: record.source_date.and_time(record.end_time),
            color: COURSE_ENTRY_COLOR.to_string(),
        })
        .collect()
}

/// Normalize raw exam rows into calendar entries, dropping rows without a
/// parseable date or time span.
pub fn exam_entries(records: &[RawExamRecord]) -> Vec<CanonicalCalendarEntry> {
    records
        .iter()
        .filter_map(|record| {
            let title = record.course_name.trim();
            if title.is_empty() {
                debug!("dropping exam row without a course name");
                return None;
            }

            let date_token = record.exam_date.split_whitespace().next()?;
            let date = match NaiveDate::parse_from_str(date_token, "%Y-%m-%d") {
                Ok(d) => d,
                Err(err) => {
                    debug!(course = title, %err, "dropping exam row with bad date");
                    return None;
                }
            };

            let start = parse_hhmm(&record.start_time).ok()?;
            let end = parse_hhmm(&record.end_time).ok()?;

            Some(CanonicalCalendarEntry {
                title: title.to_string(),
                description: format!(
                    "Location: {}\nSchedule: {}",
                    record.exam_place.trim(),
                    record.exam_time_description.trim()
                ),
                kind: EntryKind::Exam,
                start: date.and_time(start),
                end: date.and_time(end),
                color: EXAM_ENTRY_COLOR.to_string(),
            })
        })
        .collect()
}

/// Merges canonical records into the store, one transaction per pass.
pub struct ScheduleReconciler {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleReconciler {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Upsert courses (plus their derived calendar entries) and exam entries
    /// in one transaction. Course updates replace the week range only; entry
    /// updates refresh description and color.
    pub fn apply(
        &self,
        courses: &[CanonicalCourseRecord],
        exams: &[CanonicalCalendarEntry],
    ) -> Result<ReconcileCounts> {
        let derived = course_entries(courses);
        let mut counts = ReconcileCounts::default();

        self.store.with_transaction(&mut |txn| {
            counts = ReconcileCounts::default();

            for course in courses {
                match txn.find_course(&course.identity_key())? {
                    Some(id) => {
                        txn.update_course_week_range(id, &course.week_range)?;
                        counts.courses_updated += 1;
                    }
                    None => {
                        txn.insert_course(course)?;
                        counts.courses_added += 1;
                    }
                }
            }

            for entry in &derived {
                match txn.find_entry(&entry.identity_key())? {
                    Some(id) => {
                        txn.update_entry_annotations(id, &entry.description, &entry.color)?;
                        counts.entries_updated += 1;
                    }
                    None => {
                        txn.insert_entry(entry)?;
                        counts.entries_added += 1;
                    }
                }
            }

            for entry in exams {
                match txn.find_entry(&entry.identity_key())? {
                    Some(id) => {
                        txn.update_entry_annotations(id, &entry.description, &entry.color)?;
                        counts.exams_updated += 1;
                    }
                    None => {
                        txn.insert_entry(entry)?;
                        counts.exams_added += 1;
                    }
                }
            }

            Ok(())
        })?;

        Ok(counts)
    }

    /// Insert a task per homework record unless one with the same title
    /// already exists. Returns the number of tasks created.
    pub fn reconcile_homeworks(&self, homeworks: &[HomeworkRecord]) -> Result<usize> {
        let mut created = 0;

        self.store.with_transaction(&mut |txn| {
            created = 0;
            for homework in homeworks {
                let title = homework.task_title();
                if txn.find_task_by_title(&title)?.is_some() {
                    continue;
                }
                if homework.deadline().is_none() && !homework.zyjzsj.trim().is_empty() {
                    warn!(task = %title, raw = %homework.zyjzsj, "homework deadline unparseable, storing without one");
                }
                txn.insert_task(&NewTask::from(homework))?;
                created += 1;
            }
            Ok(())
        })?;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use campline_domain::{CamplineError, CourseKey, EntryKey};
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::schedule::ports::ScheduleTxn;

    #[derive(Default, Clone)]
    struct FakeData {
        courses: Vec<CanonicalCourseRecord>,
        entries: Vec<CanonicalCalendarEntry>,
        tasks: Vec<NewTask>,
    }

    /// In-memory store with copy-on-write transactions: the working copy is
    /// committed on `Ok` and discarded on `Err`, mirroring rollback.
    #[derive(Default)]
    struct FakeStore {
        data: Mutex<FakeData>,
        fail_inserts: bool,
    }

    struct FakeTxn<'a> {
        data: &'a mut FakeData,
        fail_inserts: bool,
    }

    impl ScheduleStore for FakeStore {
        fn with_transaction(
            &self,
            work: &mut dyn FnMut(&mut dyn ScheduleTxn) -> Result<()>,
        ) -> Result<()> {
            let mut guard = self.data.lock();
            let mut working = guard.clone();
            let mut txn = FakeTxn { data: &mut working, fail_inserts: self.fail_inserts };
            work(&mut txn)?;
            *guard = working;
            Ok(())
        }
    }

    impl ScheduleTxn for FakeTxn<'_> {
        fn find_course(&mut self, key: &CourseKey<'_>) -> Result<Option<i64>> {
            Ok(self
                .data
                .courses
                .iter()
                .position(|c| c.identity_key() == *key)
                .map(|i| i as i64))
        }

        fn insert_course(&mut self, record: &CanonicalCourseRecord) -> Result<()> {
            if self.fail_inserts {
                return Err(CamplineError::Database("insert refused".into()));
            }
            self.data.courses.push(record.clone());
            Ok(())
        }

        fn update_course_week_range(&mut self, id: i64, week_range: &str) -> Result<()> {
            self.data.courses[id as usize].week_range = week_range.to_string();
            Ok(())
        }

        fn find_entry(&mut self, key: &EntryKey<'_>) -> Result<Option<i64>> {
            Ok(self
                .data
                .entries
                .iter()
                .position(|e| e.identity_key() == *key)
                .map(|i| i as i64))
        }

        fn insert_entry(&mut self, entry: &CanonicalCalendarEntry) -> Result<()> {
            if self.fail_inserts {
                return Err(CamplineError::Database("insert refused".into()));
            }
            self.data.entries.push(entry.clone());
            Ok(())
        }

        fn update_entry_annotations(
            &mut self,
            id: i64,
            description: &str,
            color: &str,
        ) -> Result<()> {
            let entry = &mut self.data.entries[id as usize];
            entry.description = description.to_string();
            entry.color = color.to_string();
            Ok(())
        }

        fn find_task_by_title(&mut self, title: &str) -> Result<Option<i64>> {
            Ok(self.data.tasks.iter().position(|t| t.title == title).map(|i| i as i64))
        }

        fn insert_task(&mut self, task: &NewTask) -> Result<()> {
            self.data.tasks.push(task.clone());
            Ok(())
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date")
    }

    fn rich_row(weekday: i64, week_range: &str) -> serde_json::Value {
        json!({
            "kcmc": "Algorithms",
            "jsxm": "Dr. X",
            "jxlh": "Building A",
            "jash": "101",
            "kssj": "09:00",
            "jssj": "10:30",
            "xqj": weekday,
            "zcd": week_range,
        })
    }

    fn classify_and_normalize(rows: &[serde_json::Value], date: NaiveDate) -> Vec<CanonicalCourseRecord> {
        normalize(classify_rows(rows), date)
    }

    #[test]
    fn classifies_both_row_shapes() {
        let rows = vec![
            rich_row(1, "1-16"),
            json!({"bizName": "Linear Algebra", "time": "14:00-15:30", "place": "B-204"}),
            json!({"unexpected": true}),
        ];

        let classified = classify_rows(&rows);
        assert_eq!(classified.len(), 2);
        assert!(matches!(classified[0], RawCourseRecord::Rich(_)));
        assert!(matches!(classified[1], RawCourseRecord::Compact(_)));
    }

    #[test]
    fn rejects_out_of_range_weekday() {
        let rows = vec![rich_row(0, "1-16"), rich_row(8, "1-16"), rich_row(7, "1-16")];
        let normalized = classify_and_normalize(&rows, monday());
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].day_of_week, 7);
    }

    #[test]
    fn rejects_malformed_time_range() {
        let rows = vec![json!({
            "bizName": "Physics",
            "time": "24:10-01:00",
            "place": "C-1",
        })];
        assert!(classify_and_normalize(&rows, monday()).is_empty());
    }

    #[test]
    fn rejects_rich_row_with_empty_week_range() {
        let rows = vec![rich_row(1, "  ")];
        assert!(classify_and_normalize(&rows, monday()).is_empty());
    }

    #[test]
    fn compact_row_derives_weekday_and_defaults() {
        let rows = vec![json!({
            "bizName": "Compilers (Dr. Y)",
            "time": "08:00-09:35",
            "place": "Building D 305",
        })];

        let normalized = classify_and_normalize(&rows, monday());
        assert_eq!(normalized.len(), 1);
        let record = &normalized[0];
        assert_eq!(record.course_name, "Compilers");
        assert_eq!(record.teacher, "Dr. Y");
        assert_eq!(record.day_of_week, 1);
        assert_eq!(record.week_range, DEFAULT_WEEK_RANGE);
        assert_eq!(record.classroom, "Building D 305");
    }

    #[test]
    fn compact_row_without_teacher_uses_placeholder() {
        let rows = vec![json!({
            "bizName": "Compilers",
            "time": "08:00-09:35",
            "place": "D-305",
        })];

        let normalized = classify_and_normalize(&rows, monday());
        assert_eq!(normalized[0].teacher, UNKNOWN_TEACHER);
    }

    #[test]
    fn dedupe_keeps_same_class_on_different_days() {
        let mut a = classify_and_normalize(&[rich_row(1, "1-16")], monday());
        let tuesday = monday().succ_opt().expect("valid date");
        let b = classify_and_normalize(&[rich_row(1, "1-16")], tuesday);
        a.extend(b);

        // same row fetched twice for the same day collapses, different days survive
        let c = classify_and_normalize(&[rich_row(1, "1-16")], monday());
        a.extend(c);

        assert_eq!(dedupe(a).len(), 2);
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let store = Arc::new(FakeStore::default());
        let reconciler = ScheduleReconciler::new(store.clone());

        let courses = classify_and_normalize(&[rich_row(1, "1-16")], monday());
        let exams = exam_entries(&[RawExamRecord {
            course_name: "Algorithms".into(),
            exam_date: "2026-01-10 08:00".into(),
            start_time: "08:00".into(),
            end_time: "10:00".into(),
            exam_place: "Hall 1".into(),
            exam_time_description: "Week 18".into(),
        }]);

        let first = reconciler.apply(&courses, &exams).expect("first pass");
        assert_eq!(first.courses_added, 1);
        assert_eq!(first.entries_added, 1);
        assert_eq!(first.exams_added, 1);

        let second = reconciler.apply(&courses, &exams).expect("second pass");
        assert_eq!(second.courses_added, 0);
        assert_eq!(second.courses_updated, 1);
        assert_eq!(second.exams_added, 0);

        let data = store.data.lock();
        assert_eq!(data.courses.len(), 1);
        assert_eq!(data.entries.len(), 2);
    }

    #[test]
    fn week_range_update_reuses_existing_row() {
        let store = Arc::new(FakeStore::default());
        let reconciler = ScheduleReconciler::new(store.clone());

        let initial = classify_and_normalize(&[rich_row(1, "1-16")], monday());
        reconciler.apply(&initial, &[]).expect("initial pass");

        let revised = classify_and_normalize(&[rich_row(1, "1-17")], monday());
        let counts = reconciler.apply(&revised, &[]).expect("revised pass");

        assert_eq!(counts.courses_added, 0);
        assert_eq!(counts.courses_updated, 1);

        let data = store.data.lock();
        assert_eq!(data.courses.len(), 1);
        assert_eq!(data.courses[0].week_range, "1-17");
        assert_eq!(data.courses[0].day_of_week, 1);
    }

    #[test]
    fn failed_transaction_leaves_store_untouched() {
        let store = Arc::new(FakeStore { fail_inserts: true, ..Default::default() });
        let reconciler = ScheduleReconciler::new(store.clone());

        let courses = classify_and_normalize(&[rich_row(1, "1-16")], monday());
        assert!(reconciler.apply(&courses, &[]).is_err());
        assert!(store.data.lock().courses.is_empty());
    }

    #[test]
    fn homework_sync_inserts_each_title_once() {
        let store = Arc::new(FakeStore::default());
        let reconciler = ScheduleReconciler::new(store.clone());

        let homeworks = vec![
            HomeworkRecord {
                kcmc: "Algorithms".into(),
                zymc: "Problem Set 3".into(),
                zyxq: "Chapters 7-9".into(),
                zyjzsj: "2026-03-01 23:59:00".into(),
            },
            HomeworkRecord {
                kcmc: "Algorithms".into(),
                zymc: "Problem Set 3".into(),
                ..Default::default()
            },
        ];

        let created = reconciler.reconcile_homeworks(&homeworks).expect("sync");
        assert_eq!(created, 1);

        let again = reconciler.reconcile_homeworks(&homeworks).expect("second sync");
        assert_eq!(again, 0);
        assert_eq!(store.data.lock().tasks.len(), 1);
    }

    #[test]
    fn exam_rows_without_parseable_date_are_dropped() {
        let entries = exam_entries(&[RawExamRecord {
            course_name: "Physics".into(),
            exam_date: "soon".into(),
            start_time: "08:00".into(),
            end_time: "10:00".into(),
            ..Default::default()
        }]);
        assert!(entries.is_empty());
    }
}
