//! Due date and time parsing for task input.
//!
//! Human input is resolved against the local calendar and converted to a
//! UTC instant before it is sent.

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::ValidationError;
use crate::task::{max_due_date, min_due_date};

/// Parse human-readable due date input relative to `today`.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "monday", "next monday", "this friday" (and three-letter forms)
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD"
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        if let Some(n) = rest.strip_suffix('d') {
            if let Ok(days) = n.trim().parse::<i64>() {
                return Duration::try_days(days).and_then(|d| today.checked_add_signed(d));
            }
        }
        if let Some(n) = rest.strip_suffix('w') {
            if let Ok(weeks) = n.trim().parse::<i64>() {
                return Duration::try_weeks(weeks).and_then(|d| today.checked_add_signed(d));
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];
    let current = today.weekday().num_days_from_monday() as i64;
    for (name, target) in weekdays {
        let ahead = (target + 7 - current) % 7;
        if s == name || s == format!("this {name}") {
            return Some(today + Duration::days(ahead));
        }
        if s == format!("next {name}") {
            let days = if ahead == 0 { 7 } else { ahead + 7 };
            return Some(today + Duration::days(days));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Parse a 24-hour `HH:MM` time of day.
pub fn parse_time_input(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.trim().split_once(':')?;
    let hours: u32 = h.trim().parse().ok()?;
    let minutes: u32 = m.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Format a time of day as `HH:MM` for pre-filling inputs.
pub fn format_time_input(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Combine date and time inputs into a UTC due instant.
///
/// Empty date means no due date. A date without a time takes the time of
/// day from `now`. A time without a date is rejected.
pub fn resolve_due<Tz: TimeZone>(
    date_input: &str,
    time_input: &str,
    now: &DateTime<Tz>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let date_input = date_input.trim();
    let time_input = time_input.trim();
    if date_input.is_empty() {
        if time_input.is_empty() {
            return Ok(None);
        }
        return Err(ValidationError::TimeWithoutDate);
    }

    let local_now = now.naive_local();
    let date = parse_due_input(date_input, local_now.date())
        .ok_or_else(|| ValidationError::InvalidDueDate(date_input.to_string()))?;
    if date < min_due_date() || date > max_due_date() {
        return Err(ValidationError::DueDateOutOfRange {
            min: min_due_date().to_string(),
            max: max_due_date().to_string(),
        });
    }

    let time = if time_input.is_empty() {
        NaiveTime::from_hms_opt(local_now.hour(), local_now.minute(), 0).unwrap_or(NaiveTime::MIN)
    } else {
        parse_time_input(time_input).ok_or_else(|| ValidationError::InvalidTime(time_input.to_string()))?
    };

    let naive = date.and_time(time);
    let zoned = match now.timezone().from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // Inside a DST gap: treat the wall time as UTC-offset-free.
        LocalResult::None => return Ok(Some(naive.and_utc())),
    };
    Ok(Some(zoned.with_timezone(&Utc)))
}

/// Resolve due input against the local clock.
pub fn resolve_due_local(date_input: &str, time_input: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    resolve_due(date_input, time_input, &Local::now())
}
