//! Search bound pairs for date and numeric values.
//!
//! Every prefixed search value is converted into a half-open pair
//! `[lower, upper)` that spans the implicit precision of the value as written:
//! `2020-01` covers the whole month, `5.40` covers `[5.40, 5.41)`. A value
//! written at full precision still spans one unit of the finest representable
//! step (one microsecond for instants).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{SearchError, SearchResult};

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{2})(?:-(\d{2})(?:T(\d{2}):(\d{2})(?::(\d{2})(\.\d+)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$",
    )
    .expect("date pattern is valid")
});

/// A half-open search interval `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPair<T> {
    /// Inclusive lower bound (`s`).
    pub lower: T,
    /// Exclusive upper bound (`e`).
    pub upper: T,
}

impl<T> BoundPair<T> {
    /// Creates a bound pair.
    pub fn new(lower: T, upper: T) -> Self {
        Self { lower, upper }
    }
}

/// Precision of a FHIR date or dateTime search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatePrecision {
    /// Year only (e.g., "2024")
    Year,
    /// Year and month (e.g., "2024-01")
    Month,
    /// Full date (e.g., "2024-01-15")
    Day,
    /// Date and time to minutes (e.g., "2024-01-15T10:30Z")
    Minute,
    /// Date and time to seconds (e.g., "2024-01-15T10:30:00Z")
    Second,
    /// Fractional seconds; treated as fully precise.
    Fraction,
}

impl fmt::Display for DatePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatePrecision::Year => write!(f, "year"),
            DatePrecision::Month => write!(f, "month"),
            DatePrecision::Day => write!(f, "day"),
            DatePrecision::Minute => write!(f, "minute"),
            DatePrecision::Second => write!(f, "second"),
            DatePrecision::Fraction => write!(f, "fraction"),
        }
    }
}

/// A parsed date search value, normalized to UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateValue {
    /// The instant the value starts at, in UTC.
    pub start: NaiveDateTime,
    /// Precision the value was written with.
    pub precision: DatePrecision,
}

impl DateValue {
    /// Parses a FHIR date, dateTime or instant.
    ///
    /// Values without an offset are taken as UTC.
    pub fn parse(value: &str) -> Result<Self, String> {
        let caps = DATE_PATTERN
            .captures(value.trim())
            .ok_or_else(|| "not a valid FHIR date or dateTime".to_string())?;

        let num = |i: usize, default: u32| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(default)
        };

        let year: i32 = caps[1].parse().map_err(|_| "invalid year".to_string())?;
        let date = NaiveDate::from_ymd_opt(year, num(2, 1), num(3, 1))
            .ok_or_else(|| "date is out of range".to_string())?;

        let micros = caps
            .get(7)
            .map(|m| {
                let digits: String = m.as_str()[1..].chars().take(6).collect();
                format!("{:0<6}", digits).parse::<u32>().unwrap_or(0)
            })
            .unwrap_or(0);
        let time = NaiveTime::from_hms_micro_opt(num(4, 0), num(5, 0), num(6, 0), micros)
            .ok_or_else(|| "time is out of range".to_string())?;

        let precision = if caps.get(7).is_some() {
            DatePrecision::Fraction
        } else if caps.get(6).is_some() {
            DatePrecision::Second
        } else if caps.get(5).is_some() {
            DatePrecision::Minute
        } else if caps.get(3).is_some() {
            DatePrecision::Day
        } else if caps.get(2).is_some() {
            DatePrecision::Month
        } else {
            DatePrecision::Year
        };

        let local = NaiveDateTime::new(date, time);
        let start = match caps.get(8).map(|m| m.as_str()) {
            None | Some("Z") => local,
            Some(offset) => {
                let tz = FixedOffset::from_str(offset)
                    .map_err(|_| format!("invalid offset '{}'", offset))?;
                tz.from_local_datetime(&local)
                    .single()
                    .ok_or_else(|| "ambiguous local time".to_string())?
                    .with_timezone(&Utc)
                    .naive_utc()
            }
        };

        Ok(Self { start, precision })
    }

    /// Returns the exclusive end of the interval implied by the precision.
    pub fn end(&self) -> Option<NaiveDateTime> {
        match self.precision {
            DatePrecision::Year => self.start.checked_add_months(Months::new(12)),
            DatePrecision::Month => self.start.checked_add_months(Months::new(1)),
            DatePrecision::Day => self.start.checked_add_signed(Duration::days(1)),
            DatePrecision::Minute => self.start.checked_add_signed(Duration::minutes(1)),
            DatePrecision::Second => self.start.checked_add_signed(Duration::seconds(1)),
            DatePrecision::Fraction => self.start.checked_add_signed(Duration::microseconds(1)),
        }
    }

    /// Returns the interval covered by the value.
    pub fn bounds(&self) -> Option<BoundPair<NaiveDateTime>> {
        self.end().map(|end| BoundPair::new(self.start, end))
    }
}

/// Computes the search interval of a date value for parameter `param`.
pub fn date_bounds(param: &str, value: &str) -> SearchResult<BoundPair<NaiveDateTime>> {
    let parsed =
        DateValue::parse(value).map_err(|msg| SearchError::invalid_value(param, value, msg))?;
    parsed
        .bounds()
        .ok_or_else(|| SearchError::invalid_value(param, value, "date is out of range"))
}

/// Parses a decimal search value, accepting exponent notation.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed).ok()
    } else {
        Decimal::from_str(trimmed).ok()
    }
}

/// Computes the search interval `[v, v + 10^-scale)` of a numeric value.
pub fn decimal_bounds(param: &str, value: &str) -> SearchResult<BoundPair<Decimal>> {
    let parsed = parse_decimal(value)
        .ok_or_else(|| SearchError::invalid_value(param, value, "not a valid number"))?;
    let unit = Decimal::new(1, parsed.scale());
    let upper = parsed
        .checked_add(unit)
        .ok_or_else(|| SearchError::invalid_value(param, value, "number is out of range"))?;
    Ok(BoundPair::new(parsed, upper))
}

/// Returns true if the literal is written without a fractional part or exponent.
pub fn is_integer_literal(value: &str) -> bool {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
    }

    #[test]
    fn test_date_precision_from_value() {
        assert_eq!(DateValue::parse("2020").unwrap().precision, DatePrecision::Year);
        assert_eq!(DateValue::parse("2020-02").unwrap().precision, DatePrecision::Month);
        assert_eq!(DateValue::parse("2020-02-03").unwrap().precision, DatePrecision::Day);
        assert_eq!(
            DateValue::parse("2020-02-03T10:15Z").unwrap().precision,
            DatePrecision::Minute
        );
        assert_eq!(
            DateValue::parse("2020-02-03T10:15:30Z").unwrap().precision,
            DatePrecision::Second
        );
        assert_eq!(
            DateValue::parse("2020-02-03T10:15:30.25Z").unwrap().precision,
            DatePrecision::Fraction
        );
    }

    #[test]
    fn test_partial_date_bounds() {
        let day = date_bounds("birthdate", "2020-01-01").unwrap();
        assert_eq!(day.lower, dt("2020-01-01T00:00:00"));
        assert_eq!(day.upper, dt("2020-01-02T00:00:00"));

        let month = date_bounds("birthdate", "2020-02").unwrap();
        assert_eq!(month.upper, dt("2020-03-01T00:00:00"));

        let year = date_bounds("birthdate", "2019").unwrap();
        assert_eq!(year.lower, dt("2019-01-01T00:00:00"));
        assert_eq!(year.upper, dt("2020-01-01T00:00:00"));
    }

    #[test]
    fn test_fully_precise_date_spans_one_microsecond() {
        let bounds = date_bounds("date", "2020-01-01T10:00:00.123456Z").unwrap();
        assert_eq!(bounds.lower, dt("2020-01-01T10:00:00.123456"));
        assert_eq!(bounds.upper, dt("2020-01-01T10:00:00.123457"));
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        let bounds = date_bounds("date", "2020-01-01T10:00:00+02:00").unwrap();
        assert_eq!(bounds.lower, dt("2020-01-01T08:00:00"));
        assert_eq!(bounds.upper, dt("2020-01-01T08:00:01"));
    }

    #[test]
    fn test_invalid_date() {
        assert!(date_bounds("date", "2020-13-01").is_err());
        assert!(date_bounds("date", "yesterday").is_err());
        assert!(date_bounds("date", "2020-01-01T10").is_err());
    }

    #[test]
    fn test_decimal_bounds_use_scale() {
        let b = decimal_bounds("probability", "5.40").unwrap();
        assert_eq!(b.lower, Decimal::from_str("5.40").unwrap());
        assert_eq!(b.upper, Decimal::from_str("5.41").unwrap());

        let i = decimal_bounds("length", "100").unwrap();
        assert_eq!(i.upper, Decimal::from(101));

        let e = decimal_bounds("length", "1e2").unwrap();
        assert_eq!(e.lower, Decimal::from(100));

        assert!(decimal_bounds("length", "abc").is_err());
    }

    #[test]
    fn test_integer_literal() {
        assert!(is_integer_literal("42"));
        assert!(is_integer_literal("-7"));
        assert!(!is_integer_literal("4.2"));
        assert!(!is_integer_literal("1e3"));
        assert!(!is_integer_literal(""));
    }
}
