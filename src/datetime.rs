//! Parsing and formatting of dates.

use std::fmt::Write;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::errors::{Error, Result};

/// The Unix epoch in UTC, the value of an empty XML-RPC date.
pub fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::default().fixed_offset()
}

/// Parses an ISO-8601 timestamp as used by XML-RPC.
///
/// Accepted are the basic (`19980717T14:08:55`) and the extended
/// (`1998-07-17T14:08:55`) date form, the time with or without colons, an
/// optional fraction of a second and an optional `Z` or `±HH[:MM]` offset.
/// A timestamp without offset is in UTC.
pub fn parse_iso8601(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    let (date, time) = text.split_once(|c: char| c == 'T' || c == 't' || c == ' ')?;

    let date = parse_date(date)?;
    let (time, offset) = split_offset(time)?;
    let time = parse_time(time)?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    let digits: String = match date.len() {
        8 => date.to_owned(),
        10 if date.as_bytes()[4] == b'-' && date.as_bytes()[7] == b'-' => date.replace('-', ""),
        _ => return None,
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        digits[..4].parse().ok()?,
        digits[4..6].parse().ok()?,
        digits[6..8].parse().ok()?,
    )
}

fn parse_time(time: &str) -> Option<NaiveTime> {
    let (hms, fraction) = match time.split_once(|c: char| c == '.' || c == ',') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (time, None),
    };
    let digits: String = match hms.len() {
        6 => hms.to_owned(),
        8 if hms.as_bytes()[2] == b':' && hms.as_bytes()[5] == b':' => hms.replace(':', ""),
        _ => return None,
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos = match fraction {
        None => 0,
        Some(f) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => {
            // nine digits of precision, the rest is cut
            let mut padded: String = f.chars().take(9).collect();
            while padded.len() < 9 {
                padded.push('0');
            }
            padded.parse().ok()?
        }
        Some(_) => return None,
    };
    NaiveTime::from_hms_nano_opt(
        digits[..2].parse().ok()?,
        digits[2..4].parse().ok()?,
        digits[4..6].parse().ok()?,
        nanos,
    )
}

/// Splits a trailing `Z` / `±HH[:MM]` offset from the time part.
fn split_offset(time: &str) -> Option<(&str, FixedOffset)> {
    if let Some(time) = time.strip_suffix(|c: char| c == 'Z' || c == 'z') {
        return Some((time, FixedOffset::east_opt(0)?));
    }
    let sign_at = match time.rfind(|c: char| c == '+' || c == '-') {
        Some(i) => i,
        None => return Some((time, FixedOffset::east_opt(0)?)),
    };
    let (time, offset) = time.split_at(sign_at);
    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let digits = offset[1..].replace(':', "");
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes): (i32, i32) = match digits.len() {
        2 => (digits.parse().ok()?, 0),
        4 => (digits[..2].parse().ok()?, digits[2..].parse().ok()?),
        _ => return None,
    };
    Some((time, FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?))
}

/// Formats a date as an XML-RPC `dateTime.iso8601` value in UTC.
///
/// A fraction of a second is written with six digits, or with nine when the
/// date has sub-microsecond precision, so that [`parse_iso8601`] reads back
/// the same instant. The format has a four digit year: dates before year 0
/// or after year 9999 (in UTC) are an [`Error::Serialize`].
pub fn format_xmlrpc(date: &DateTime<FixedOffset>) -> Result<String> {
    let utc = date.with_timezone(&Utc);
    if !(0..=9999).contains(&utc.year()) {
        return Err(Error::Serialize(format!(
            "year {} of date {} does not fit the XML-RPC date format",
            utc.year(),
            date.to_rfc3339()
        )));
    }
    let mut out = format!(
        "{:04}{:02}{:02}T{:02}:{:02}:{:02}",
        utc.year(),
        utc.month(),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second()
    );
    let nanos = utc.nanosecond() % 1_000_000_000;
    if nanos % 1_000 != 0 {
        let _ = write!(out, ".{:09}", nanos);
    } else if nanos != 0 {
        let _ = write!(out, ".{:06}", nanos / 1_000);
    }
    Ok(out)
}

/// Formats a date with a pattern made of the following tokens; everything
/// else is copied literally:
///
/// | Token  | Meaning
/// |--------|---------------------------------
/// | `YYYY` | four digit year
/// | `YY`   | two digit year
/// | `MM`   | two digit month
/// | `DD`   | two digit day of month
/// | `HH`   | two digit hour (24 hours)
/// | `mm`   | two digit minutes
/// | `SS`   | two digit seconds
/// | `ms`   | three digit milliseconds
/// | `us`   | six digit microseconds
/// | `Z`    | UTC offset as `+HH:MM`
///
/// ```
/// # use chrono::DateTime;
/// # use xml_value::datetime::format_pattern;
/// let date = DateTime::parse_from_rfc3339("2024-02-29T13:05:09+01:00").unwrap();
/// assert_eq!(format_pattern(&date, "YYYYMMDDHHmmSS"), "20240229130509");
/// assert_eq!(format_pattern(&date, "DD.MM.YY HH:mm Z"), "29.02.24 13:05 +01:00");
/// ```
pub fn format_pattern(date: &DateTime<FixedOffset>, pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    while let Some(c) = rest.chars().next() {
        let token = ["YYYY", "YY", "MM", "DD", "HH", "mm", "SS", "ms", "us", "Z"]
            .iter()
            .find(|t| rest.starts_with(*t));
        let _ = match token {
            Some(&"YYYY") => write!(out, "{:04}", date.year()),
            Some(&"YY") => write!(out, "{:02}", date.year().rem_euclid(100)),
            Some(&"MM") => write!(out, "{:02}", date.month()),
            Some(&"DD") => write!(out, "{:02}", date.day()),
            Some(&"HH") => write!(out, "{:02}", date.hour()),
            Some(&"mm") => write!(out, "{:02}", date.minute()),
            Some(&"SS") => write!(out, "{:02}", date.second()),
            Some(&"ms") => write!(out, "{:03}", date.nanosecond() / 1_000_000),
            Some(&"us") => write!(out, "{:06}", date.nanosecond() / 1_000),
            Some(_) => write!(out, "{}", date.format("%:z")),
            None => write!(out, "{}", c),
        };
        let len = token.map_or(c.len_utf8(), |t| t.len());
        rest = &rest[len..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap().fixed_offset()
    }

    #[test]
    fn basic_and_extended_forms() {
        let expected = utc(1998, 7, 17, 14, 8, 55);
        assert_eq!(parse_iso8601("19980717T14:08:55"), Some(expected));
        assert_eq!(parse_iso8601("1998-07-17T14:08:55"), Some(expected));
        assert_eq!(parse_iso8601("19980717T140855"), Some(expected));
        assert_eq!(parse_iso8601(" 19980717T14:08:55Z\n"), Some(expected));
    }

    #[test]
    fn offsets_and_fractions() {
        let parsed = parse_iso8601("2001-02-03T04:05:06.5+02:00").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 7200);
        assert_eq!(parsed.with_timezone(&Utc).hour(), 2);
        assert_eq!(parsed.nanosecond(), 500_000_000);
        assert_eq!(
            parse_iso8601("20010203T04:05:06-0130").map(|d| d.offset().local_minus_utc()),
            Some(-5400)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_iso8601(""), None);
        assert_eq!(parse_iso8601("yesterday"), None);
        assert_eq!(parse_iso8601("19981317T14:08:55"), None);
        assert_eq!(parse_iso8601("19980717T25:08:55"), None);
        assert_eq!(parse_iso8601("19980717T14:08:55.x"), None);
    }

    #[test]
    fn xmlrpc_format_is_utc() {
        let date = DateTime::parse_from_rfc3339("2001-02-03T04:05:06.000250+02:00").unwrap();
        assert_eq!(format_xmlrpc(&date).unwrap(), "20010203T02:05:06.000250");
        assert_eq!(format_xmlrpc(&epoch()).unwrap(), "19700101T00:00:00");
    }

    #[test]
    fn xmlrpc_format_reads_back() {
        let nanos = DateTime::parse_from_rfc3339("2001-02-03T04:05:06.123456789-05:00").unwrap();
        let text = format_xmlrpc(&nanos).unwrap();
        assert_eq!(text, "20010203T09:05:06.123456789");
        assert_eq!(parse_iso8601(&text), Some(nanos));

        let last = utc(9999, 12, 31, 23, 59, 59);
        assert_eq!(parse_iso8601(&format_xmlrpc(&last).unwrap()), Some(last));
        let first = utc(0, 1, 1, 0, 0, 0);
        assert_eq!(format_xmlrpc(&first).unwrap(), "00000101T00:00:00");
        assert_eq!(parse_iso8601("00000101T00:00:00"), Some(first));
    }

    #[test]
    fn xmlrpc_format_rejects_five_digit_years() {
        for date in [utc(10000, 1, 1, 0, 0, 0), utc(-1, 12, 31, 0, 0, 0)] {
            match format_xmlrpc(&date) {
                Err(Error::Serialize(msg)) => assert!(msg.contains("XML-RPC"), "{}", msg),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
