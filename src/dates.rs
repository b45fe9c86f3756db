/// Timestamp handling for ESM rows and Last-Modified headers
///
/// ESM reports wall-clock parts at a fixed UTC-8 offset with no daylight
/// saving. Rows are converted to an absolute instant and shown in the
/// viewer's zone.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::fmt::Display;

pub const ESM_SOURCE_UTC_OFFSET_MINUTES: i64 = -8 * 60;

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// The five wall-clock fields of a report row, month 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
}

/// Milliseconds since the epoch for the given fields read as UTC.
///
/// Out-of-range fields roll over into the next larger unit (month 13 is
/// January of the following year, day 0 is the last day of the previous
/// month), matching `Date.UTC`.
pub fn utc_ms_from_fields(year: i64, month_index: i64, day: i64, hour: i64, minute: i64) -> i64 {
    let year = year.saturating_add(month_index.div_euclid(12));
    let month = month_index.rem_euclid(12) as u32 + 1;

    let month_start = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, 1))
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
        .unwrap_or(0);

    month_start
        .saturating_add(day.saturating_sub(1).saturating_mul(MS_PER_DAY))
        .saturating_add(hour.saturating_mul(MS_PER_HOUR))
        .saturating_add(minute.saturating_mul(MS_PER_MINUTE))
}

/// Absolute instant, in epoch milliseconds, of an ESM row's date parts.
pub fn esm_parts_to_utc_ms(parts: &DateParts) -> i64 {
    utc_ms_from_fields(parts.year, parts.month - 1, parts.day, parts.hour, parts.minute)
        - ESM_SOURCE_UTC_OFFSET_MINUTES * MS_PER_MINUTE
}

pub fn esm_instant(parts: &DateParts) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(esm_parts_to_utc_ms(parts))
}

/// Row date label in the viewer's zone, e.g. `01/15/2024, 08:30 PM PST`.
pub fn format_esm_date_label<Tz>(parts: &DateParts, tz: &Tz, zone_label: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(instant) = esm_instant(parts) else {
        return String::new();
    };
    let local = instant.with_timezone(tz).format("%m/%d/%Y, %I:%M %p").to_string();
    with_zone_label(local, zone_label)
}

/// Parse an HTTP-date (RFC 1123, RFC 850 or asctime) or an RFC 3339 stamp.
pub fn parse_http_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed);
    }

    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Zone the server stated at the end of a Last-Modified value: a 2-4 letter
/// abbreviation (upper-cased) or a `+HHMM`/`-HHMM` offset.
pub fn last_modified_source_timezone(raw: &str) -> Option<String> {
    let tail = raw.split_whitespace().last()?;

    let is_abbreviation =
        (2..=4).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_alphabetic());
    if is_abbreviation {
        return Some(tail.to_ascii_uppercase());
    }

    let bytes = tail.as_bytes();
    let is_offset = bytes.len() == 5
        && matches!(bytes[0], b'+' | b'-')
        && bytes[1..].iter().all(u8::is_ascii_digit);
    is_offset.then(|| tail.to_string())
}

/// Re-render a Last-Modified value in the viewer's zone. Values that do not
/// parse are returned unchanged.
pub fn format_last_modified<Tz>(raw: &str, tz: &Tz, zone_label: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match parse_http_date(raw) {
        Some(parsed) => {
            let local = parsed.with_timezone(tz).format("%m/%d/%Y %H:%M:%S").to_string();
            with_zone_label(local, zone_label)
        }
        None => raw.to_string(),
    }
}

/// Footer text and optional server-zone tooltip for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastModifiedLabel {
    pub text: String,
    pub source_tooltip: Option<String>,
}

pub fn last_modified_label<Tz>(raw: Option<&str>, tz: &Tz, zone_label: &str) -> LastModifiedLabel
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => LastModifiedLabel {
            text: "Last-Modified: (real-time)".to_string(),
            source_tooltip: None,
        },
        Some(value) => LastModifiedLabel {
            text: format!("Last-Modified: {}", format_last_modified(value, tz, zone_label)),
            source_tooltip: last_modified_source_timezone(value)
                .map(|zone| format!("Server time: {} (converted to your timezone)", zone)),
        },
    }
}

fn with_zone_label(text: String, zone_label: &str) -> String {
    if zone_label.is_empty() {
        text
    } else {
        format!("{} {}", text, zone_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(year: i64, month: i64, day: i64, hour: i64, minute: i64) -> DateParts {
        DateParts { year, month, day, hour, minute }
    }

    #[test]
    fn test_pacific_parts_convert_to_utc() {
        let instant = esm_instant(&parts(2024, 1, 15, 20, 30)).unwrap();
        assert_eq!(instant.to_rfc3339(), "2024-01-16T04:30:00+00:00");
    }

    #[test]
    fn test_no_daylight_saving_adjustment() {
        let instant = esm_instant(&parts(2024, 7, 4, 12, 0)).unwrap();
        assert_eq!(instant.to_rfc3339(), "2024-07-04T20:00:00+00:00");
    }

    #[test]
    fn test_fields_roll_over_like_date_utc() {
        assert_eq!(
            utc_ms_from_fields(2023, 12, 1, 0, 0),
            utc_ms_from_fields(2024, 0, 1, 0, 0)
        );
        assert_eq!(
            utc_ms_from_fields(2024, 2, 0, 0, 0),
            utc_ms_from_fields(2024, 1, 29, 0, 0)
        );
        assert_eq!(utc_ms_from_fields(1970, 0, 1, 25, 0), 25 * MS_PER_HOUR);
    }

    #[test]
    fn test_date_label_in_fixed_zone() {
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        let label = format_esm_date_label(&parts(2024, 1, 15, 20, 30), &eastern, "EST");
        assert_eq!(label, "01/15/2024, 11:30 PM EST");
    }

    #[test]
    fn test_date_label_without_zone() {
        let label = format_esm_date_label(&parts(2024, 1, 15, 20, 30), &Utc, "");
        assert_eq!(label, "01/16/2024, 04:30 AM");
    }

    #[test]
    fn test_parse_http_date_formats() {
        let expected = "2024-01-16T04:30:00+00:00";
        let rfc1123 = parse_http_date("Tue, 16 Jan 2024 04:30:00 GMT").unwrap();
        assert_eq!(rfc1123.with_timezone(&Utc).to_rfc3339(), expected);

        let rfc3339 = parse_http_date("2024-01-15T20:30:00-08:00").unwrap();
        assert_eq!(rfc3339.with_timezone(&Utc).to_rfc3339(), expected);

        assert!(parse_http_date("yesterday-ish").is_none());
        assert!(parse_http_date("   ").is_none());
    }

    #[test]
    fn test_source_timezone_detection() {
        assert_eq!(
            last_modified_source_timezone("Tue, 16 Jan 2024 04:30:00 gmt"),
            Some("GMT".to_string())
        );
        assert_eq!(
            last_modified_source_timezone("Tue, 16 Jan 2024 04:30:00 -0800"),
            Some("-0800".to_string())
        );
        assert_eq!(last_modified_source_timezone("Tue, 16 Jan 2024 04:30:00"), None);
        assert_eq!(last_modified_source_timezone(""), None);
    }

    #[test]
    fn test_format_last_modified_falls_back_to_raw() {
        assert_eq!(format_last_modified("not a date", &Utc, "UTC"), "not a date");
        assert_eq!(
            format_last_modified("Tue, 16 Jan 2024 04:30:00 GMT", &Utc, "UTC"),
            "01/16/2024 04:30:00 UTC"
        );
    }

    #[test]
    fn test_last_modified_label() {
        let realtime = last_modified_label(None, &Utc, "UTC");
        assert_eq!(realtime.text, "Last-Modified: (real-time)");
        assert_eq!(realtime.source_tooltip, None);

        let stamped = last_modified_label(Some("Tue, 16 Jan 2024 04:30:00 GMT"), &Utc, "UTC");
        assert_eq!(stamped.text, "Last-Modified: 01/16/2024 04:30:00 UTC");
        assert_eq!(
            stamped.source_tooltip.as_deref(),
            Some("Server time: GMT (converted to your timezone)")
        );
    }
}
