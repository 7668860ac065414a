//! Timestamp helpers.
//!
//! Rows store both an ISO-8601 string and an integer epoch-seconds shadow
//! for range indexing; these helpers keep the two representations in step.

use chrono::{DateTime, Utc};

/// Current time as (ISO-8601 string, epoch seconds).
#[must_use]
pub fn now_pair() -> (String, i64) {
    let now = Utc::now();
    (now.to_rfc3339(), now.timestamp())
}

/// Current ISO-8601 timestamp.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Current epoch seconds.
#[must_use]
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// Parses an ISO-8601 timestamp into epoch seconds, tolerating a missing
/// offset (treated as UTC). Returns 0 on unparseable input.
#[must_use]
pub fn iso_to_epoch(iso: &str) -> i64 {
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return dt.timestamp();
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc().timestamp();
    }
    0
}

/// Epoch seconds to an ISO-8601 UTC timestamp.
#[must_use]
pub fn epoch_to_iso(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_round_trip() {
        let (iso, epoch) = now_pair();
        assert_eq!(iso_to_epoch(&iso), epoch);
    }

    #[test]
    fn naive_timestamps_are_treated_as_utc() {
        assert_eq!(iso_to_epoch("1970-01-01T00:01:00"), 60);
        assert_eq!(iso_to_epoch("garbage"), 0);
    }
}
