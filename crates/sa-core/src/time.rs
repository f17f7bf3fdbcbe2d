//! Date argument parsing and the wire date format.
//!
//! Dates reach the adapters in several shapes: epoch seconds as digits,
//! ISO-8601 strings with or without an offset, the appliance's
//! `"19 May 2020 10:35 (GMT +00:00)"` style, and relative expressions such
//! as `"3 days"` or `"2 hours ago"`. Everything is resolved to UTC.

use crate::args::ArgError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for every date sent to a vendor API.
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Formats an instant in the wire format (`2019-11-20T09:36:09.000Z`).
pub fn to_wire_format(dt: &DateTime<Utc>) -> String {
    dt.format(WIRE_DATE_FORMAT).to_string()
}

/// Parses a user supplied date, resolving relative expressions against `now`.
pub fn parse_date(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.eq_ignore_ascii_case("now") {
        return Some(now);
    }
    parse_timestamp(s)
        .or_else(|| parse_relative(s).and_then(|ago| now.checked_sub_signed(ago)))
}

/// Parses an absolute timestamp as vendors return them.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = s.parse().ok()?;
        return Utc.timestamp_opt(secs, 0).single();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = s.trim_end_matches('Z');
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    parse_gmt_suffixed(s)
}

/// Parses `"19 May 2020 10:35 (GMT +00:00)"`.
fn parse_gmt_suffixed(s: &str) -> Option<DateTime<Utc>> {
    let (local, rest) = s.split_once("(GMT")?;
    let offset_str = rest.trim().trim_end_matches(')').trim();

    let offset = if offset_str.is_empty() {
        FixedOffset::east_opt(0)?
    } else {
        let sign = match offset_str.as_bytes()[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return None,
        };
        let (h, m) = offset_str[1..].split_once(':')?;
        let (h, m) = (h.parse::<u8>().ok()?, m.parse::<u8>().ok()?);
        if h > 23 || m > 59 {
            return None;
        }
        FixedOffset::east_opt(sign * (i32::from(h) * 3600 + i32::from(m) * 60))?
    };

    let local = local.trim();
    let naive = NaiveDateTime::parse_from_str(local, "%d %b %Y %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(local, "%d %b %Y %H:%M:%S"))
        .ok()?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a relative expression (`"3 days"`, `"2 hours ago"`) into a duration.
///
/// Amounts too large for a [`Duration`] yield `None`.
pub fn parse_relative(input: &str) -> Option<Duration> {
    let lowered = input.trim().to_ascii_lowercase();
    let mut parts = lowered.split_whitespace();

    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    match parts.next() {
        None | Some("ago") => {}
        Some(_) => return None,
    }
    if parts.next().is_some() || amount < 0 {
        return None;
    }

    let unit = unit.trim_end_matches('s');
    match unit {
        "second" | "sec" => Duration::try_seconds(amount),
        "minute" | "min" => Duration::try_minutes(amount),
        "hour" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        "month" => amount.checked_mul(30).and_then(Duration::try_days),
        "year" => amount.checked_mul(365).and_then(Duration::try_days),
        _ => None,
    }
}

/// Resolves an optional date argument to epoch seconds.
///
/// Digit-only input is taken as epoch seconds as-is. A missing argument is
/// an error only when `required` is set.
pub fn arg_to_timestamp(
    arg: Option<&str>,
    arg_name: &str,
    required: bool,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ArgError> {
    let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
        if required {
            return Err(ArgError::Missing(arg_name.to_string()));
        }
        return Ok(None);
    };

    parse_date(arg, now)
        .map(|dt| Some(dt.timestamp()))
        .ok_or_else(|| ArgError::InvalidDate(arg_name.to_string()))
}

/// Normalizes a date argument to the wire format.
pub fn arg_to_wire_date(
    arg: Option<&str>,
    arg_name: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, ArgError> {
    let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(None);
    };

    parse_date(arg, now)
        .map(|dt| Some(to_wire_format(&dt)))
        .ok_or_else(|| ArgError::InvalidDate(arg_name.to_string()))
}

/// Where the first poll cycle starts when no watermark exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstFetch {
    /// A duration before the current time.
    Relative(Duration),
    /// A fixed instant.
    Absolute(DateTime<Utc>),
}

impl FirstFetch {
    /// Parses a configured first-fetch value.
    ///
    /// A relative value must reach back to a representable instant.
    pub fn parse(input: &str) -> Result<Self, ArgError> {
        if let Some(ago) = parse_relative(input) {
            if Utc::now().checked_sub_signed(ago).is_none() {
                return Err(ArgError::InvalidDate("first_fetch".to_string()));
            }
            return Ok(Self::Relative(ago));
        }
        parse_timestamp(input)
            .map(Self::Absolute)
            .ok_or_else(|| ArgError::InvalidDate("first_fetch".to_string()))
    }

    /// Lower bound for a first cycle that starts at `now`.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Relative(ago) => now
                .checked_sub_signed(*ago)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            Self::Absolute(at) => *at,
        }
    }
}

impl Default for FirstFetch {
    fn default() -> Self {
        Self::Relative(Duration::days(3))
    }
}

impl fmt::Display for FirstFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative(ago) => write!(f, "{} seconds", ago.num_seconds()),
            Self::Absolute(at) => write!(f, "{}", to_wire_format(at)),
        }
    }
}

impl Serialize for FirstFetch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FirstFetch {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FirstFetch::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_wire_format_from_naive_date() {
        let dt = parse_date("2019-11-20 09:36:09", fixed_now()).unwrap();
        assert_eq!(to_wire_format(&dt), "2019-11-20T09:36:09.000Z");
    }

    #[test]
    fn test_offset_is_converted_to_utc() {
        let dt = parse_date("2017-02-14T09:51:46.000-0600", fixed_now()).unwrap();
        assert_eq!(to_wire_format(&dt), "2017-02-14T15:51:46.000Z");
    }

    #[test]
    fn test_xmatters_created_format() {
        let dt = parse_date("2020-01-23T21:45:45.392+0000", fixed_now()).unwrap();
        assert_eq!(to_wire_format(&dt), "2020-01-23T21:45:45.392Z");
    }

    #[test]
    fn test_gmt_suffixed_format() {
        let dt = parse_date("19 May 2020 10:35 (GMT -05:00)", fixed_now()).unwrap();
        assert_eq!(to_wire_format(&dt), "2020-05-19T15:35:00.000Z");
    }

    #[test]
    fn test_gmt_offset_out_of_range() {
        assert_eq!(parse_timestamp("19 May 2020 10:35 (GMT +99999999:00)"), None);
        assert_eq!(parse_timestamp("19 May 2020 10:35 (GMT +24:00)"), None);
        assert_eq!(parse_timestamp("19 May 2020 10:35 (GMT +05:60)"), None);
        assert!(parse_timestamp("19 May 2020 10:35 (GMT +23:59)").is_some());
    }

    #[test]
    fn test_epoch_digits() {
        let dt = parse_date("1000", fixed_now()).unwrap();
        assert_eq!(dt.timestamp(), 1000);
    }

    #[test]
    fn test_relative_expressions() {
        let now = fixed_now();
        assert_eq!(parse_date("3 days", now), Some(now - Duration::days(3)));
        assert_eq!(parse_date("2 hours ago", now), Some(now - Duration::hours(2)));
        assert_eq!(parse_date("1 Week", now), Some(now - Duration::weeks(1)));
        assert_eq!(parse_date("3 fortnights", now), None);
        assert_eq!(parse_date("soon", now), None);
    }

    #[test]
    fn test_oversized_relative_dates() {
        let now = fixed_now();
        assert_eq!(parse_relative("999999999999999 days"), None);
        assert_eq!(parse_relative("9223372036854775807 years"), None);
        assert_eq!(parse_date("1000000 years", now), None);
        assert_eq!(
            arg_to_wire_date(Some("999999999999999 days"), "from", now),
            Err(ArgError::InvalidDate("from".to_string()))
        );
        assert_eq!(
            arg_to_timestamp(Some("1000000 years"), "from", false, now),
            Err(ArgError::InvalidDate("from".to_string()))
        );
    }

    #[test]
    fn test_first_fetch_rejects_unreachable_start() {
        assert_eq!(
            FirstFetch::parse("1000000 years"),
            Err(ArgError::InvalidDate("first_fetch".to_string()))
        );
        let ago = parse_relative("200000 years").unwrap();
        let first = FirstFetch::Relative(ago);
        let now = fixed_now();
        assert_eq!(first.lower_bound(now), now - ago);
        let huge = FirstFetch::Relative(parse_relative("100000000 days").unwrap());
        assert_eq!(huge.lower_bound(now), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_vendor_timestamps_are_absolute_only() {
        assert!(parse_timestamp("2020-01-23T21:45:45.000+0000").is_some());
        assert_eq!(parse_timestamp("3 days"), None);
        assert_eq!(parse_timestamp("now"), None);
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let dt = Utc.timestamp_millis_opt(1_579_815_945_392).unwrap();
        let parsed = parse_date(&to_wire_format(&dt), fixed_now()).unwrap();
        assert_eq!(parsed, dt);
    }

    #[test]
    fn test_arg_to_timestamp() {
        let now = fixed_now();
        assert_eq!(arg_to_timestamp(Some("1500"), "from", false, now), Ok(Some(1500)));
        assert_eq!(arg_to_timestamp(None, "from", false, now), Ok(None));
        assert_eq!(
            arg_to_timestamp(None, "from", true, now),
            Err(ArgError::Missing("from".to_string()))
        );
        assert_eq!(
            arg_to_timestamp(Some("not a date"), "from", false, now),
            Err(ArgError::InvalidDate("from".to_string()))
        );
    }

    #[test]
    fn test_first_fetch_three_days() {
        let now = fixed_now();
        let first = FirstFetch::parse("3 days").unwrap();
        assert_eq!(first.lower_bound(now), now - Duration::days(3));
    }

    #[test]
    fn test_first_fetch_absolute() {
        let first = FirstFetch::parse("2024-01-01T00:00:00Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(first.lower_bound(fixed_now()), expected);
    }

    #[test]
    fn test_first_fetch_serde() {
        let first: FirstFetch = serde_json::from_str("\"12 hours\"").unwrap();
        assert_eq!(first, FirstFetch::Relative(Duration::hours(12)));
        let json = serde_json::to_string(&first).unwrap();
        let back: FirstFetch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, first);
    }
}
