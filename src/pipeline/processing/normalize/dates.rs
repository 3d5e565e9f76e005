use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::constants::{
    BARE_DATE_FORMAT, HEVY_DATE_FORMAT, HEVY_DATE_FORMAT_12H, ISO_DATE_TIME_FORMAT,
    STRONG_DATE_FORMAT,
};
use crate::types::ImportSource;

/// Formats tried after the vendor's primary one
const FALLBACK_FORMATS: &[&str] = &[HEVY_DATE_FORMAT_12H, ISO_DATE_TIME_FORMAT];

fn primary_format(source: ImportSource) -> &'static str {
    match source {
        ImportSource::Strong => STRONG_DATE_FORMAT,
        ImportSource::Hevy => HEVY_DATE_FORMAT,
    }
}

/// Parse an export timestamp.
///
/// Tries the vendor format, then the fallbacks, then the leading date-only
/// token at midnight. `None` means the value is unparseable.
pub fn parse_date(value: &str, source: ImportSource) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    std::iter::once(primary_format(source))
        .chain(FALLBACK_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_date_only(value))
}

fn parse_date_only(value: &str) -> Option<NaiveDateTime> {
    let token = value
        .split(|c| c == ' ' || c == ',' || c == 'T')
        .find(|s| !s.is_empty())?;
    NaiveDate::parse_from_str(token, BARE_DATE_FORMAT)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_strong_primary_format() {
        assert_eq!(
            parse_date("2024-03-12 18:30:05", ImportSource::Strong),
            Some(dt(2024, 3, 12, 18, 30, 5))
        );
    }

    #[test]
    fn test_hevy_primary_format() {
        assert_eq!(
            parse_date("12 Mar 2024, 18:30", ImportSource::Hevy),
            Some(dt(2024, 3, 12, 18, 30, 0))
        );
    }

    #[test]
    fn test_twelve_hour_fallback() {
        assert_eq!(
            parse_date("12 Mar 2024, 6:30 PM", ImportSource::Hevy),
            Some(dt(2024, 3, 12, 18, 30, 0))
        );
    }

    #[test]
    fn test_iso_fallback_for_either_source() {
        let expected = Some(dt(2024, 3, 12, 7, 5, 0));
        assert_eq!(parse_date("2024-03-12T07:05:00", ImportSource::Hevy), expected);
        assert_eq!(parse_date("2024-03-12T07:05:00", ImportSource::Strong), expected);
    }

    #[test]
    fn test_date_only_fallback() {
        assert_eq!(
            parse_date("2024-03-12", ImportSource::Hevy),
            Some(dt(2024, 3, 12, 0, 0, 0))
        );
        assert_eq!(
            parse_date("2024-03-12T07:05:00.000Z", ImportSource::Hevy),
            Some(dt(2024, 3, 12, 0, 0, 0))
        );
        assert_eq!(
            parse_date("2024-03-12 7pm", ImportSource::Strong),
            Some(dt(2024, 3, 12, 0, 0, 0))
        );
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date("", ImportSource::Strong), None);
        assert_eq!(parse_date("yesterday", ImportSource::Strong), None);
        assert_eq!(parse_date("31 Foo 2024, 10:00", ImportSource::Hevy), None);
    }
}
