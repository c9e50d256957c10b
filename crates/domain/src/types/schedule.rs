//! Schedule record types
//!
//! The campus portal serves two incompatible row shapes for the same
//! conceptual data. `RawCourseRecord` models that as an explicit sum so the
//! reconciler classifies a row exactly once instead of sniffing fields at
//! every use site.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

/// One raw schedule row as returned by the portal, classified by shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCourseRecord {
    Rich(RawRichCourse),
    Compact(RawCompactCourse),
}

/// Full-detail row: separate fields for teacher, building, room and an
/// explicit weekday and week range.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRichCourse {
    /// Course name
    pub kcmc: String,
    /// Teacher name
    pub jsxm: String,
    /// Building
    pub jxlh: String,
    /// Room number
    pub jash: String,
    /// Start time, `HH:MM`
    pub kssj: String,
    /// End time, `HH:MM`
    pub jssj: String,
    /// Weekday 1-7 (Monday-Sunday); the portal serves this as either a
    /// number or a string depending on the endpoint revision
    #[serde(deserialize_with = "int_or_string")]
    pub xqj: i64,
    /// Week range, e.g. `"1-16"`
    pub zcd: String,
}

/// Condensed row: a display name, a combined `HH:MM-HH:MM` time string and a
/// combined place string. Carries no teacher, weekday or week info.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCompactCourse {
    #[serde(rename = "bizName")]
    pub biz_name: String,
    pub time: String,
    pub place: String,
}

/// Accept a JSON number or a numeric string.
fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => Ok(value),
        IntOrString::Str(value) => {
            value.trim().parse::<i64>().map_err(serde::de::Error::custom)
        }
    }
}

/// A normalized course row ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCourseRecord {
    pub course_name: String,
    pub teacher: String,
    pub classroom: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// 1-7, Monday-Sunday
    pub day_of_week: u8,
    pub week_range: String,
    /// Date of the query that produced this row. Part of the dedupe key but
    /// not of the persisted course identity.
    pub source_date: NaiveDate,
}

impl CanonicalCourseRecord {
    /// Persisted identity: everything except `week_range` and `source_date`.
    pub fn identity_key(&self) -> CourseKey<'_> {
        CourseKey {
            course_name: &self.course_name,
            teacher: &self.teacher,
            classroom: &self.classroom,
            start_time: self.start_time,
            end_time: self.end_time,
            day_of_week: self.day_of_week,
        }
    }

    /// In-pass dedupe key; includes the source date so identical classes on
    /// different days stay distinct until persistence.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}",
            self.course_name,
            self.teacher,
            self.classroom,
            self.start_time,
            self.end_time,
            self.day_of_week,
            self.source_date
        )
    }
}

/// Borrowed course identity key used for store lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseKey<'a> {
    pub course_name: &'a str,
    pub teacher: &'a str,
    pub classroom: &'a str,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub day_of_week: u8,
}

/// Kind of calendar entry produced by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Course,
    Exam,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Course => "course",
            EntryKind::Exam => "exam",
        }
    }
}

/// A normalized calendar entry ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCalendarEntry {
    pub title: String,
    pub description: String,
    pub kind: EntryKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: String,
}

impl CanonicalCalendarEntry {
    /// Persisted identity: title, kind and the exact time span.
    pub fn identity_key(&self) -> EntryKey<'_> {
        EntryKey { title: &self.title, kind: self.kind, start: self.start, end: self.end }
    }
}

/// Borrowed entry identity key used for store lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryKey<'a> {
    pub title: &'a str,
    pub kind: EntryKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One raw exam row from the exam endpoint. All fields are optional on the
/// wire; rows missing date or times are dropped during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExamRecord {
    #[serde(default)]
    pub course_name: String,
    /// `YYYY-MM-DD`, sometimes with a trailing time component
    #[serde(default)]
    pub exam_date: String,
    /// `HH:MM`
    #[serde(default)]
    pub start_time: String,
    /// `HH:MM`
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub exam_place: String,
    #[serde(default)]
    pub exam_time_description: String,
}

/// Net effect of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileCounts {
    pub courses_added: usize,
    pub courses_updated: usize,
    pub entries_added: usize,
    pub entries_updated: usize,
    pub exams_added: usize,
    pub exams_updated: usize,
}

/// Result of a multi-day sync window.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub courses: Vec<CanonicalCourseRecord>,
    pub exams: Vec<CanonicalCalendarEntry>,
    pub counts: ReconcileCounts,
}

/// Outcome of a portal data call that may require re-authentication.
///
/// An absent or server-invalidated session is a normal, typed outcome here,
/// never an error: callers branch on it to prompt for login.
#[derive(Debug, Clone)]
pub enum FetchOutcome<T> {
    Data(T),
    NeedLogin { login_url: Option<String> },
}

impl<T> FetchOutcome<T> {
    pub fn is_need_login(&self) -> bool {
        matches!(self, FetchOutcome::NeedLogin { .. })
    }
}
