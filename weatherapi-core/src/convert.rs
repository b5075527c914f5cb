use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// A date/time string was present but not parsable.
///
/// Absent values are fine (they pass through as `None`); garbage is not,
/// unlike the numeric coercions below which swallow anything.
#[derive(Debug, Error)]
#[error("could not parse datetime value: {0:?}")]
pub struct InvalidDateTime(pub String);

/// Coerce a JSON scalar to a float rounded to one decimal place.
///
/// The vendor is inconsistent about numbers vs. numeric strings, so both are
/// accepted. Anything else (missing, null, objects) is `None`.
pub fn to_float(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Some((number * 10.0).round() / 10.0)
}

/// Coerce a JSON scalar to an integer.
///
/// Accepts integers, floats (truncated toward zero) and integer strings;
/// everything else is `None`.
pub fn to_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Interpret the vendor's `is_day` flag.
///
/// An absent flag means daytime; a present flag counts as daytime only when
/// it coerces to exactly 1.
pub fn is_daytime(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(v) => to_int(Some(v)) == Some(1),
    }
}

const NAIVE_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Normalize a date or datetime string to an RFC 3339 UTC instant.
///
/// `None` passes through. Offset-bearing inputs are converted to UTC; naive
/// inputs (including bare `YYYY-MM-DD` dates, which become midnight) are
/// taken as already being UTC.
pub fn datetime_to_iso(value: Option<&str>) -> Result<Option<String>, InvalidDateTime> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(dt.with_timezone(&Utc).to_rfc3339()));
    }
    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(ndt.and_utc().to_rfc3339()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Some(date.and_time(NaiveTime::MIN).and_utc().to_rfc3339()));
    }

    Err(InvalidDateTime(raw.to_string()))
}
