use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, SpanviewError};

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Parses an OTLP decimal nanosecond timestamp. Empty, negative or
/// non-numeric input yields `None`.
pub fn parse_unix_nanos(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u64>().ok()
}

/// Converts epoch nanoseconds to fractional epoch milliseconds. The whole
/// milliseconds and the sub-millisecond remainder are converted separately so
/// realistic epoch values keep exact millisecond precision.
pub fn nanos_to_millis(nanos: u64) -> f64 {
    let whole = (nanos / NANOS_PER_MILLI) as f64;
    let frac = (nanos % NANOS_PER_MILLI) as f64 / NANOS_PER_MILLI as f64;
    whole + frac
}

pub fn millis_to_datetime(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis < 0.0 {
        return None;
    }
    let nanos = (millis * NANOS_PER_MILLI as f64) as i64;
    let secs = nanos.div_euclid(1_000_000_000);
    let subnanos = nanos.rem_euclid(1_000_000_000) as u32;
    Utc.timestamp_opt(secs, subnanos).single()
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| SpanviewError::Parse(format!("invalid duration {input}: {e}")))
}
