use chrono::{DateTime, Utc};

/// Current UTC instant.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Message timestamps are stored as epoch milliseconds so that
/// `ORDER BY` on the column is chronological.
pub fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// RFC 3339 text for display-only columns (archived_at, updated_at).
pub fn to_sqlite(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Whole seconds elapsed between `since` and `now` (negative if `since` is in the future).
pub fn idle_secs(since: &DateTime<Utc>, now: &DateTime<Utc>) -> i64 {
    (*now - *since).num_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_roundtrip() {
        let dt = now();
        let parsed = from_millis(to_millis(&dt)).unwrap();
        assert_eq!(dt.timestamp_millis(), parsed.timestamp_millis());
    }

    #[test]
    fn test_idle_secs_sign() {
        let a = now();
        let b = a + chrono::Duration::seconds(90);
        assert_eq!(idle_secs(&a, &b), 90);
        assert_eq!(idle_secs(&b, &a), -90);
    }
}
