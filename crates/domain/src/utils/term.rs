//! Academic-term and weekday derivation
//!
//! The exam endpoint is keyed by a term code derived from a calendar date:
//! the academic year runs August through July, with the first term spanning
//! August-February and the second the rest.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::errors::{CamplineError, Result};

/// Derive the term code for a query date.
///
/// Months 8-12 of year A belong to term `A-(A+1)-1`; months 1-2 of year A
/// are the tail of the previous academic year's first term, `(A-1)-A-1`;
/// everything else is `A-(A+1)-2`.
pub fn term_code_for(date: NaiveDate) -> String {
    let year = date.year();
    match date.month() {
        8..=12 => format!("{}-{}-1", year, year + 1),
        1..=2 => format!("{}-{}-1", year - 1, year),
        _ => format!("{}-{}-2", year, year + 1),
    }
}

/// ISO weekday, 1 (Monday) through 7 (Sunday).
pub fn iso_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// Parse a strict `HH:MM` clock time, rejecting out-of-range components.
pub fn parse_hhmm(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    let (h, m) = raw
        .split_once(':')
        .ok_or_else(|| CamplineError::InvalidInput(format!("not a HH:MM time: {raw:?}")))?;

    let hour: u32 = h
        .parse()
        .map_err(|_| CamplineError::InvalidInput(format!("bad hour in {raw:?}")))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| CamplineError::InvalidInput(format!("bad minute in {raw:?}")))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| CamplineError::InvalidInput(format!("out-of-range time: {raw:?}")))
}
