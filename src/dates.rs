//! Date Normalizer
//!
//! Turns heterogeneous date cells into a canonical calendar date and
//! provides the month bucket keys used for grouping.
//!
//! # Parse order
//!
//! 1. Native timestamps pass through.
//! 2. Numbers and pure-digit strings are spreadsheet serials: days since
//!    1899-12-30 (so `42384` is 2016-01-15).
//! 3. Strings containing `/` are read **day first**: `DD/MM/YYYY`. A
//!    four-digit first part means `YYYY/MM/DD`. Two-digit years are 20YY.
//!    A second part above 12 does not parse; the parts are never swapped.
//! 4. Strings containing `-` are ISO dates (`YYYY-MM-DD`, optionally
//!    followed by a time, or a bare `YYYY-MM` month key).
//! 5. Anything else goes through a list of generic formats (RFC 3339,
//!    RFC 2822, month names).
//!
//! Unparsable input yields `None`.

use crate::query::FilterOp;
use crate::value::Value;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

/// Month names for label rendering, January first
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Largest serial accepted (9999-12-31)
const MAX_SERIAL: i64 = 2_958_465;

const FALLBACK_FORMATS: [&str; 8] = [
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y%m%d",
    "%d.%m.%Y",
];

/// A calendar date truncated to day granularity
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    /// Build a date, rejecting impossible ones (Feb 30, month 13)
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from)
    }

    /// Bucket key `YYYY-MM`
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Day key `YYYY-MM-DD`
    pub fn day_key(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Format with a chrono format string
    pub fn format(&self, fmt: &str) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, self.day) {
            Some(date) => date.format(fmt).to_string(),
            None => self.day_key(),
        }
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Normalize a cell
pub fn normalize(value: &Value) -> Option<CalendarDate> {
    match value {
        Value::Timestamp(ts) => Some(CalendarDate::from(ts.date())),
        Value::Number(n) => from_serial(n.floor() as i64),
        Value::Text(s) => normalize_str(s),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Normalize a string
pub fn normalize_str(raw: &str) -> Option<CalendarDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(date) = s.parse::<i64>().ok().and_then(from_serial) {
            return Some(date);
        }
    } else if s.contains('/') {
        if let Some(date) = parse_slashed(s) {
            return Some(date);
        }
    } else if s.contains('-') {
        if let Some(date) = parse_iso(s) {
            return Some(date);
        }
    }

    parse_fallback(s)
}

/// Day-count serial since 1899-12-30
fn from_serial(days: i64) -> Option<CalendarDate> {
    if !(1..=MAX_SERIAL).contains(&days) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch
        .checked_add_signed(Duration::days(days))
        .map(CalendarDate::from)
}

/// `DD/MM/YYYY` or `YYYY/MM/DD`
fn parse_slashed(s: &str) -> Option<CalendarDate> {
    // Drop a trailing time component ("15/01/2016 10:30")
    let date_part = s.split_whitespace().next()?;
    let parts: Vec<&str> = date_part.split('/').map(str::trim).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let nums: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<_>>()?;

    if parts[0].len() == 4 {
        return CalendarDate::new(nums[0] as i32, nums[1], nums[2]);
    }

    let year = match parts[2].len() {
        2 => 2000 + nums[2] as i32,
        4 => nums[2] as i32,
        _ => return None,
    };
    CalendarDate::new(year, nums[1], nums[0])
}

/// ISO date, ISO date-time prefix, or `YYYY-MM`
fn parse_iso(s: &str) -> Option<CalendarDate> {
    let date_part = s.split(['T', ' ']).next()?;

    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(date.into());
    }

    let (year, month) = parse_month_key(date_part)?;
    CalendarDate::new(year, month, 1)
}

fn parse_fallback(s: &str) -> Option<CalendarDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive().into());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive().into());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date().into());
    }

    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(CalendarDate::from)
}

/// Compare two dates at day granularity
///
/// `IN` and `LIKE` never match.
pub fn compare(a: &CalendarDate, op: FilterOp, b: &CalendarDate) -> bool {
    op.compare_ord(a, b)
}

/// Month bucket key for a cell, if it parses
pub fn month_bucket(value: &Value) -> Option<String> {
    normalize(value).map(|d| d.month_key())
}

/// Split a `YYYY-MM` key into (year, month)
pub fn parse_month_key(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year = year.parse::<i32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Render `YYYY-MM` as `<MonthName> <Year>`
pub fn render_month_key(key: &str) -> Option<String> {
    let (year, month) = parse_month_key(key)?;
    Some(format!("{} {}", MONTH_NAMES[(month - 1) as usize], year))
}

/// Render a bucket key for display; non-month keys pass through
pub fn render_label(key: &str) -> String {
    render_month_key(key).unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::new(y, m, d).unwrap()
    }

    #[test]
    fn test_day_first_slash_dates() {
        assert_eq!(normalize_str("15/01/2016"), Some(date(2016, 1, 15)));
        assert_eq!(normalize_str("03/04/2016"), Some(date(2016, 4, 3)));
        assert_eq!(normalize_str("3/4/16"), Some(date(2016, 4, 3)));
        assert_eq!(normalize_str("2016/01/15"), Some(date(2016, 1, 15)));
        assert_eq!(normalize_str("15/01/2016 10:30"), Some(date(2016, 1, 15)));
    }

    #[test]
    fn test_month_first_is_not_guessed() {
        // 01/15/2016 would need month 15
        assert_eq!(normalize_str("01/15/2016"), None);
        assert_eq!(normalize_str("1/2"), None);
    }

    #[test]
    fn test_iso_dates() {
        assert_eq!(normalize_str("2016-01-20"), Some(date(2016, 1, 20)));
        assert_eq!(normalize_str("2016-01-20T08:00:00Z"), Some(date(2016, 1, 20)));
        assert_eq!(normalize_str("2016-01-20 08:00:00"), Some(date(2016, 1, 20)));
        assert_eq!(normalize_str("2016-02"), Some(date(2016, 2, 1)));
        assert_eq!(normalize_str("2016-02-30"), None);
    }

    #[test]
    fn test_serials() {
        assert_eq!(normalize_str("42384"), Some(date(2016, 1, 15)));
        assert_eq!(normalize(&Value::Number(42384.75)), Some(date(2016, 1, 15)));
        assert_eq!(normalize_str("0"), None);
    }

    #[test]
    fn test_compact_digits_fall_back() {
        // Out of serial range, parsed as YYYYMMDD
        assert_eq!(normalize_str("20160115"), Some(date(2016, 1, 15)));
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(normalize_str("January 15, 2016"), Some(date(2016, 1, 15)));
        assert_eq!(normalize_str("15 Jan 2016"), Some(date(2016, 1, 15)));
        assert_eq!(normalize_str("Fri, 15 Jan 2016 10:00:00 +0000"), Some(date(2016, 1, 15)));
        assert_eq!(normalize_str("not a date"), None);
        assert_eq!(normalize(&Value::Null), None);
    }

    #[test]
    fn test_timestamp_passthrough() {
        let ts = NaiveDate::from_ymd_opt(2016, 3, 9)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        assert_eq!(normalize(&Value::Timestamp(ts)), Some(date(2016, 3, 9)));
    }

    #[test]
    fn test_mixed_formats_share_a_bucket() {
        let a = month_bucket(&Value::from("15/01/2016")).unwrap();
        let b = month_bucket(&Value::from("2016-01-20")).unwrap();
        assert_eq!(a, "2016-01");
        assert_eq!(a, b);
        assert_eq!(render_label(&a), "January 2016");
    }

    #[test]
    fn test_compare_truncates_to_day() {
        let morning = normalize_str("2016-01-15T08:00:00").unwrap();
        let evening = normalize_str("15/01/2016 22:00").unwrap();
        assert!(compare(&morning, FilterOp::Eq, &evening));
        assert!(compare(&date(2016, 1, 16), FilterOp::Gt, &morning));
        assert!(compare(&morning, FilterOp::Lte, &evening));
        assert!(!compare(&morning, FilterOp::In, &evening));
    }

    #[test]
    fn test_render_labels() {
        assert_eq!(render_label("2016-12"), "December 2016");
        assert_eq!(render_label("Kentucky"), "Kentucky");
        assert_eq!(render_label("2016-13"), "2016-13");
    }
}
