use chrono::{DateTime, TimeZone, Utc};

/// Truncate `now` down to the nearest multiple of the window length from the
/// Unix epoch. Deterministic: concurrent submitters agree on "which window"
/// without any coordination.
pub fn window_start(now: DateTime<Utc>, window_minutes: i32) -> DateTime<Utc> {
    let len_secs = i64::from(window_minutes) * 60;
    let secs = now.timestamp();
    let floored = secs - secs.rem_euclid(len_secs);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(now)
}

/// The start of the most recently closed window: the one clearing should
/// operate on when a scheduler tick fires at `now`.
pub fn last_closed_window(now: DateTime<Utc>, window_minutes: i32) -> DateTime<Utc> {
    window_start(now, window_minutes) - chrono::Duration::minutes(i64::from(window_minutes))
}
