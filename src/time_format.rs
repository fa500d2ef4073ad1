// src/time_format.rs
use chrono::{DateTime, Duration, Local, TimeZone, Utc};

/// Formats a second count as `m:ss` (minutes are not wrapped into hours).
#[must_use]
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Human readable duration: `30s`, `45 min`, `1h`, `1h 30min`.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    match (hours, minutes) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}min"),
    }
}

/// Coarse "time ago" label relative to `now`. Older than a week falls back to
/// a short local date such as `Mar 4`.
pub fn format_relative_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_hours = (now - date).num_hours();
    let diff_days = diff_hours / 24;

    if diff_hours < 1 {
        "Just now".to_string()
    } else if diff_hours < 24 {
        format!("{diff_hours}h ago")
    } else if diff_days < 7 {
        format!("{diff_days}d ago")
    } else {
        date.with_timezone(&Local).format("%b %-d").to_string()
    }
}

/// True if `date` is no older than `days` days before `now`.
pub fn is_within_days(date: DateTime<Utc>, days: i64, now: DateTime<Utc>) -> bool {
    date >= now - Duration::days(days)
}

/// Midnight at the start of `date`'s calendar day in its own timezone.
/// Falls back to `date` when midnight does not exist locally (DST gap).
pub fn start_of_day<Tz: TimeZone>(date: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = date.timezone();
    date.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .unwrap_or_else(|| date.clone())
}

/// Full weekday name, e.g. `Monday`.
pub fn day_name<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%A").to_string()
}
