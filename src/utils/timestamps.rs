use chrono::{DateTime, TimeDelta, Utc};

/// Instant `hours` before `now`; events last touched before it are expired.
/// Retention windows too large for chrono saturate at the earliest instant.
pub fn cutoff_before(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    TimeDelta::try_hours(hours.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
