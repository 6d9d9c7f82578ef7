//! Fixed-width log timestamp conversion.
//!
//! The logger writes `YYYY-MM-DD HHMMSS` with no zone marker. Fields are
//! sliced at fixed character offsets and read with leading-digits
//! semantics, so a field such as `"07x"` reads as 7 and `"x7"` is malformed.
//!
//! The wall-clock value is interpreted in the local zone of this process
//! unless `assume_utc` is set, even though the logger records UTC-less
//! local time on a different host. Callers that know both ends agree on UTC
//! should turn `assume_utc` on.
//!
//! The month field is the 1-based calendar month. The legacy chart handed it
//! to a 0-based month constructor, which placed every point one month late
//! (`2024-01-01` charted as February 1st). `legacy_month_offset` reproduces
//! that shift for comparing against old charts; it is off by default.

use super::ParserConfig;
use chrono::{LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};

/// Character ranges of each calendar field within the timestamp cell.
const YEAR: (usize, usize) = (0, 4);
const MONTH: (usize, usize) = (5, 7);
const DAY: (usize, usize) = (8, 10);
const HOUR: (usize, usize) = (11, 13);
const MINUTE: (usize, usize) = (13, 15);
const SECOND: (usize, usize) = (15, 18);

/// Raw calendar fields as read from a timestamp cell.
///
/// Values are not range checked; [`CalendarFields::to_naive`] rolls
/// overflowing fields into the next larger unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
    pub second: i64,
}

impl CalendarFields {
    /// Slice and read every field. `None` if any field has no leading digits.
    pub fn parse(cell: &str) -> Option<Self> {
        Some(Self {
            year: field(cell, YEAR)?,
            month: field(cell, MONTH)?,
            day: field(cell, DAY)?,
            hour: field(cell, HOUR)?,
            minute: field(cell, MINUTE)?,
            second: field(cell, SECOND)?,
        })
    }

    /// Build a wall-clock datetime. Month is the 1-based calendar month;
    /// out-of-range values carry over (second 75 is one minute and fifteen
    /// seconds, month 13 is January of the following year).
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let months = self.year.checked_mul(12)?.checked_add(self.month - 1)?;
        let year = i32::try_from(months.div_euclid(12)).ok()?;
        let month = u32::try_from(months.rem_euclid(12) + 1).ok()?;

        let start_of_month = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
        let offset = TimeDelta::try_days(self.day - 1)?
            .checked_add(&TimeDelta::try_hours(self.hour)?)?
            .checked_add(&TimeDelta::try_minutes(self.minute)?)?
            .checked_add(&TimeDelta::try_seconds(self.second)?)?;

        start_of_month.checked_add_signed(offset)
    }

    /// Treat the month field as 0-based, moving the date one month later.
    pub fn with_zero_based_month(self) -> Self {
        Self {
            month: self.month.saturating_add(1),
            ..self
        }
    }

    /// Unix seconds in UTC or the process's local zone.
    pub fn to_unix_seconds(self, assume_utc: bool) -> Option<f64> {
        let naive = self.to_naive()?;
        let millis = if assume_utc {
            naive.and_utc().timestamp_millis()
        } else {
            local_millis(naive)?
        };
        Some(millis as f64 / 1000.0)
    }
}

/// Convert a timestamp cell to Unix seconds under the parser's time options.
pub fn to_unix_seconds(cell: &str, config: &ParserConfig) -> Option<f64> {
    let mut fields = CalendarFields::parse(cell)?;
    if config.legacy_month_offset {
        fields = fields.with_zero_based_month();
    }
    fields.to_unix_seconds(config.assume_utc)
}

/// Interpret a wall-clock time in the process's local zone. Ambiguous times
/// (clocks rolled back) resolve to the earlier instant; times inside a
/// forward gap are pushed past it.
fn local_millis(naive: NaiveDateTime) -> Option<i64> {
    let resolved = match chrono::Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => chrono::Local
            .from_local_datetime(&naive.checked_add_signed(TimeDelta::try_hours(1)?)?)
            .earliest()?,
    };
    Some(resolved.timestamp_millis())
}

fn field(cell: &str, (start, end): (usize, usize)) -> Option<i64> {
    let slice: String = cell.chars().skip(start).take(end - start).collect();
    leading_int(&slice)
}

/// Read an integer the way a lenient CSV consumer does: skip leading
/// whitespace, accept an optional sign, then take digits until the first
/// non-digit. No digits at all is `None`.
pub fn leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let value: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -value } else { value })
}
