//! Display formatters for durations, ages and counts.
//!
//! All functions are pure: the same input (and the same `now`) always yields
//! the same string.

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Parse a compact duration code (`PT1H2M3S`) into total seconds.
///
/// Hour, minute and second segments are each optional and default to zero.
/// A leading day segment (`P1DT2H`) is also honored. Returns `None` when the
/// code is absent, unparseable, or carries no time segment at all, so "zero
/// seconds" (`PT0S`) stays distinguishable from "unknown".
pub fn parse_duration(code: Option<&str>) -> Option<u64> {
    let code = code?.trim();
    let rest = code.strip_prefix('P')?;

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_segment = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            'D' | 'H' | 'M' | 'S' => {
                // Month designator before `T` is not a duration we can size
                if !in_time && c != 'D' {
                    return None;
                }
                if in_time && c == 'D' {
                    return None;
                }
                let value: u64 = digits.parse().ok()?;
                digits.clear();
                let unit = match c {
                    'D' => SECONDS_PER_DAY as u64,
                    'H' => 3600,
                    'M' => 60,
                    _ => 1,
                };
                total = total.checked_add(value.checked_mul(unit)?)?;
                saw_segment = true;
            }
            _ => return None,
        }
    }

    if !digits.is_empty() || !saw_segment {
        return None;
    }
    Some(total)
}

/// Render seconds as a badge: `m:ss` below one hour, `h:mm:ss` above.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Whole days between `published` and `now`, ignoring direction.
pub fn elapsed_days(published: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - published).num_seconds().abs() / SECONDS_PER_DAY
}

/// Bucket the age of an item into a human-readable phrase.
///
/// Buckets use plain floor division (`days / 7`, `days / 30`, `days / 365`),
/// so ten days renders as `1 weeks ago`.
pub fn format_relative_age(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = elapsed_days(published, now);
    match days {
        0 => "Today".to_string(),
        1 => "1 day ago".to_string(),
        2..=6 => format!("{} days ago", days),
        7..=29 => format!("{} weeks ago", days / 7),
        30..=364 => format!("{} months ago", days / 30),
        _ => format!("{} years ago", days / 365),
    }
}

/// Abbreviate a count: `999`, `1.5K`, `2.5M`.
pub fn format_view_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}
