use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date `{input}`: expected YYYY-MM-DD")]
    InvalidFormat { input: String },
    #[error("start date {start} is after end date {end}")]
    RangeInvariant { start: CalendarDate, end: CalendarDate },
}

/// A calendar date parsed from a `YYYY-MM-DD` string.
///
/// The segments are kept zero-padded so the original string can always be
/// reconstituted, and a canonical integer encoding (`20231205`) is derived
/// for ordering. Day-of-month is only range-checked against `[1, 31]`; it is
/// deliberately not validated against the specific month or leap years.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarDate {
    year: String,
    month: String,
    day: String,
}

impl CalendarDate {
    /// Parses a `YYYY-MM-DD` string.
    ///
    /// The input must split on `-` into exactly three segments: a 4-digit
    /// year, a month in `[1, 12]`, and a day in `[1, 31]`. A segment that
    /// fails its pattern gets exactly one repair attempt: zero-pad to two
    /// characters and re-validate.
    pub fn parse(input: &str) -> Result<Self, DateError> {
        let invalid = || DateError::InvalidFormat { input: input.to_owned() };

        let segments: Vec<&str> = input.split('-').collect();
        let [year, month, day] = segments.as_slice() else {
            return Err(invalid());
        };

        if year.len() != 4 || !year.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }

        let month = normalize_segment(month, 1..=12).ok_or_else(invalid)?;
        let day = normalize_segment(day, 1..=31).ok_or_else(invalid)?;

        Ok(Self { year: (*year).to_owned(), month, day })
    }

    pub fn from_ymd(year: u16, month: u8, day: u8) -> Result<Self, DateError> {
        Self::parse(&format!("{year:04}-{month:02}-{day:02}"))
    }

    pub fn year(&self) -> u16 {
        self.year.parse().unwrap_or_default()
    }

    pub fn month(&self) -> u8 {
        self.month.parse().unwrap_or_default()
    }

    pub fn day(&self) -> u8 {
        self.day.parse().unwrap_or_default()
    }

    /// The three zero-padded segments in display order.
    pub fn segments(&self) -> [&str; 3] {
        [&self.year, &self.month, &self.day]
    }

    /// Canonical integer encoding: the digits concatenated, e.g. `20231205`.
    pub fn canonical(&self) -> u32 {
        u32::from(self.year()) * 10_000 + u32::from(self.month()) * 100 + u32::from(self.day())
    }
}

fn normalize_segment(segment: &str, range: std::ops::RangeInclusive<u8>) -> Option<String> {
    if let Some(valid) = check_segment(segment, &range) {
        return Some(valid);
    }

    // One repair attempt: zero-pad to two characters and re-validate.
    let padded = format!("{segment:0>2}");
    check_segment(&padded, &range)
}

fn check_segment(segment: &str, range: &std::ops::RangeInclusive<u8>) -> Option<String> {
    if segment.len() != 2 || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let value: u8 = segment.parse().ok()?;
    range.contains(&value).then(|| segment.to_owned())
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}-{}-{}", self.year, self.month, self.day)
    }
}

impl Ord for CalendarDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl PartialOrd for CalendarDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An inclusive date range with the invariant `start <= end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: CalendarDate,
    end: CalendarDate,
}

impl DateRange {
    /// Violating `start <= end` is a validation failure, never a silent swap.
    pub fn new(start: CalendarDate, end: CalendarDate) -> Result<Self, DateError> {
        if start > end {
            return Err(DateError::RangeInvariant { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &CalendarDate {
        &self.start
    }

    pub fn end(&self) -> &CalendarDate {
        &self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn into_parts(self) -> (CalendarDate, CalendarDate) {
        (self.start, self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} through {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::{CalendarDate, DateError, DateRange};

    #[test]
    fn parse_round_trips_valid_dates() {
        for input in ["2023-12-05", "2024-01-31", "1999-06-09", "2222-12-31"] {
            let date = CalendarDate::parse(input).expect("valid date");
            assert_eq!(date.segments().join("-"), input);
            assert_eq!(date.to_string(), input);
        }
    }

    #[test]
    fn parse_zero_pads_single_digit_segments() {
        let date = CalendarDate::parse("2019-4-7").expect("repairable date");
        assert_eq!(date.to_string(), "2019-04-07");
        assert_eq!(date.segments(), ["2019", "04", "07"]);
    }

    #[test]
    fn parse_rejects_non_four_digit_years() {
        for input in ["19-04-07", "20191-04-07", "abcd-04-07", "201x-04-07"] {
            assert!(matches!(
                CalendarDate::parse(input),
                Err(DateError::InvalidFormat { .. })
            ));
        }
    }

    #[test]
    fn parse_rejects_out_of_range_segments() {
        for input in ["2019-13-05", "2019-00-05", "2019-22-03", "2012-04-33", "2019-04-00"] {
            assert!(CalendarDate::parse(input).is_err(), "{input} should fail");
        }
    }

    #[test]
    fn parse_rejects_wrong_segment_counts() {
        for input in ["2019-04", "2019-04-05-06", "20190405", ""] {
            assert!(CalendarDate::parse(input).is_err(), "{input} should fail");
        }
    }

    #[test]
    fn day_is_not_checked_against_month_length() {
        // Month-length and leap-year validation are deliberately out of
        // scope; the picker only sends real dates.
        assert!(CalendarDate::parse("2023-02-31").is_ok());
    }

    #[test]
    fn canonical_encoding_concatenates_digits() {
        let date = CalendarDate::parse("2023-12-05").expect("valid date");
        assert_eq!(date.canonical(), 20_231_205);
    }

    #[test]
    fn ordering_is_lexicographic_over_year_month_day() {
        let dates = [
            CalendarDate::parse("2019-12-31").expect("valid"),
            CalendarDate::parse("2020-01-01").expect("valid"),
            CalendarDate::parse("2020-01-02").expect("valid"),
            CalendarDate::parse("2020-02-01").expect("valid"),
            CalendarDate::parse("2021-01-01").expect("valid"),
        ];

        for window in dates.windows(2) {
            assert!(window[0] < window[1], "{} < {}", window[0], window[1]);
        }
        assert_eq!(
            CalendarDate::parse("2020-1-1").expect("valid"),
            CalendarDate::parse("2020-01-01").expect("valid")
        );
    }

    #[test]
    fn range_rejects_start_after_end() {
        let start = CalendarDate::parse("2024-03-10").expect("valid");
        let end = CalendarDate::parse("2024-03-01").expect("valid");

        assert!(matches!(
            DateRange::new(start, end),
            Err(DateError::RangeInvariant { .. })
        ));
    }

    #[test]
    fn range_accepts_equal_endpoints() {
        let day = CalendarDate::parse("2024-03-01").expect("valid");
        let range = DateRange::new(day.clone(), day).expect("single-day range");
        assert_eq!(range.start(), range.end());
    }

    #[test]
    fn overlap_detection_spans_year_boundaries() {
        let december = DateRange::new(
            CalendarDate::parse("2023-12-20").expect("valid"),
            CalendarDate::parse("2024-01-05").expect("valid"),
        )
        .expect("range");
        let january = DateRange::new(
            CalendarDate::parse("2024-01-01").expect("valid"),
            CalendarDate::parse("2024-01-10").expect("valid"),
        )
        .expect("range");
        let spring = DateRange::new(
            CalendarDate::parse("2024-03-01").expect("valid"),
            CalendarDate::parse("2024-03-10").expect("valid"),
        )
        .expect("range");

        assert!(december.overlaps(&january));
        assert!(january.overlaps(&december));
        assert!(!january.overlaps(&spring));
    }
}
