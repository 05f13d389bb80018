use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

use sugarlog_core::models::{at_offset, validate_calendar_date};

/// Parse a UTC offset: `Z`, `UTC`, `+HH:MM`, `+HHMM` or `+HH` (sign required).
pub(crate) fn parse_utc_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("UTC offset");
    }

    let invalid = || format!("Invalid UTC offset '{s}'. Use Z, +HH:MM or -HH:MM");
    let (sign, rest) = match s.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) || !matches!(digits.len(), 2 | 4) {
        bail!(invalid());
    }
    let hours: i32 = digits[..2].parse().with_context(invalid)?;
    let minutes: i32 = if digits.len() == 4 {
        digits[2..].parse().with_context(invalid)?
    } else {
        0
    };
    if minutes >= 60 {
        bail!(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).with_context(invalid)
}

/// Today's calendar date as seen at `offset`.
pub(crate) fn today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

pub(crate) fn parse_date(date_str: Option<String>, offset: FixedOffset) -> Result<NaiveDate> {
    let date = match date_str {
        None => today(offset),
        Some(s) => match s.as_str() {
            "today" => today(offset),
            "yesterday" => today(offset) - Duration::days(1),
            "tomorrow" => today(offset) + Duration::days(1),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            })?,
        },
    };
    validate_calendar_date(date)?;
    Ok(date)
}

pub(crate) fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("Invalid time '{s}'. Use HH:MM or HH:MM:SS"))
}

/// Parse an entry timestamp. RFC 3339 keeps its own offset; a bare
/// `YYYY-MM-DD HH:MM[:SS]` is read at `offset`. No value means now.
pub(crate) fn parse_timestamp(
    at: Option<String>,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>> {
    let Some(s) = at else {
        return Ok(Utc::now().with_timezone(&offset));
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&s) {
        return Ok(ts);
    }
    let local = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&s, fmt).ok())
        .with_context(|| {
            format!("Invalid timestamp '{s}'. Use RFC 3339 or 'YYYY-MM-DD HH:MM'")
        })?;
    Ok(at_offset(local, offset))
}

/// Both bounds or neither; a half-open range is rejected.
pub(crate) fn parse_day_range(
    start: Option<String>,
    end: Option<String>,
    offset: FixedOffset,
) -> Result<Option<(NaiveDate, NaiveDate)>> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = parse_date(Some(start), offset)?;
            let end = parse_date(Some(end), offset)?;
            if end < start {
                bail!("End date {end} is before start date {start}");
            }
            Ok(Some((start, end)))
        }
        _ => bail!("Both --start and --end are required to filter by date"),
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn format_grams(v: Option<f64>) -> String {
    v.map_or("-".into(), |g| format!("{:.1}", no_neg_zero(g)))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("utc").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+07:00").unwrap().local_minus_utc(), 7 * 3600);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("+09").unwrap().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_parse_utc_offset_invalid() {
        assert!(parse_utc_offset("07:00").is_err());
        assert!(parse_utc_offset("+7").is_err());
        assert!(parse_utc_offset("+07:75").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("").is_err());
        assert!(parse_utc_offset("+ab:cd").is_err());
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = today(utc());
        assert_eq!(parse_date(None, utc()).unwrap(), today);
        assert_eq!(parse_date(Some("today".to_string()), utc()).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string()), utc()).unwrap(),
            today - Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string()), utc()).unwrap(),
            today + Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso_and_invalid() {
        let date = parse_date(Some("2025-03-01".to_string()), utc()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!(parse_date(Some("03/01/2025".to_string()), utc()).is_err());
        assert!(parse_date(Some("2025-02-30".to_string()), utc()).is_err());
    }

    #[test]
    fn test_parse_date_rejects_far_years() {
        let err = parse_date(Some("+262142-12-05".to_string()), utc()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(
            parse_day_range(
                Some("+262142-11-01".to_string()),
                Some("+262142-12-05".to_string()),
                utc()
            )
            .is_err()
        );
        assert!(parse_date(Some("9999-12-31".to_string()), utc()).is_ok());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("07:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(parse_time("07:30:15").unwrap(), NaiveTime::from_hms_opt(7, 30, 15).unwrap());
        assert!(parse_time("7pm").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let plus7 = FixedOffset::east_opt(7 * 3600).unwrap();
        let rfc = parse_timestamp(Some("2025-03-01T08:00:00-05:00".to_string()), plus7).unwrap();
        assert_eq!(rfc.to_rfc3339(), "2025-03-01T08:00:00-05:00");

        let local = parse_timestamp(Some("2025-03-01 08:15".to_string()), plus7).unwrap();
        assert_eq!(local.to_rfc3339(), "2025-03-01T08:15:00+07:00");

        assert!(parse_timestamp(Some("yesterday noon".to_string()), plus7).is_err());
        assert_eq!(*parse_timestamp(None, plus7).unwrap().offset(), plus7);
    }

    #[test]
    fn test_parse_day_range() {
        assert!(parse_day_range(None, None, utc()).unwrap().is_none());
        let (start, end) = parse_day_range(
            Some("2025-03-01".to_string()),
            Some("2025-03-03".to_string()),
            utc(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());

        assert!(parse_day_range(Some("2025-03-01".to_string()), None, utc()).is_err());
        assert!(
            parse_day_range(
                Some("2025-03-03".to_string()),
                Some("2025-03-01".to_string()),
                utc()
            )
            .is_err()
        );
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("User 3 not found"), r#"{"error":"User 3 not found"}"#);
    }

    #[test]
    fn test_format_grams() {
        assert_eq!(format_grams(None), "-");
        assert_eq!(format_grams(Some(-0.0)), "0.0");
        assert_eq!(format_grams(Some(12.345)), "12.3");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("Crème brûlée au sucre", 10), "Crème b...");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }
}
