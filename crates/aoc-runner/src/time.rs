//! Time utilities for aoc-runner.
//!
//! Record timestamps are naive local date-times, persisted as ISO-8601
//! strings with microsecond precision (`2024-01-16T10:12:22.760942`).

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Return the current local time, truncated to the persisted precision.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

/// Format a timestamp as an ISO-8601 string.
pub fn to_iso8601(ts: &NaiveDateTime) -> String {
    ts.format(ISO_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts naive date-times with or without fractional seconds, and
/// RFC 3339 strings carrying an offset (converted to local time).
pub fn parse_iso8601(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ts);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}

/// Serde adapter for ISO-8601 timestamps.
pub mod iso8601 {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_iso8601(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_iso8601(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {raw}")))
    }
}
