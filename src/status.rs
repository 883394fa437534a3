//! Countdown / overdue text for a booking's return time.
//!
//! Everything here takes `now` explicitly so the same booking always renders
//! the same way for a given clock reading.

use chrono::{Datelike, DateTime, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};

use crate::models::{TimeInfo, UrgencyCategory};

const MINUTES_IN_DAY: i64 = 1_440;
const MINUTES_IN_MONTH: i64 = 43_200;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn compute_time_info(end: Option<DateTime<Utc>>, now: &DateTime<FixedOffset>) -> TimeInfo {
    let Some(end) = end else {
        debug!("no end date available, falling back to unknown time status");
        return unknown();
    };

    let end_local = end.with_timezone(&now.timezone());
    let remaining = end_local.signed_duration_since(*now);

    if end_local.date_naive() == now.date_naive() {
        let hours = remaining.num_hours();
        let minutes = remaining.num_minutes() % 60;

        let text = if hours > 0 {
            format!("{hours}h {minutes}m remaining today")
        } else if minutes > 0 {
            format!("{minutes}m remaining today")
        } else {
            "Due now".to_string()
        };

        return TimeInfo {
            text,
            category: UrgencyCategory::ReturningToday,
        };
    }

    if *now > end_local {
        return TimeInfo {
            text: describe_elapsed(&end_local, now),
            category: UrgencyCategory::Expired,
        };
    }

    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;

    let (text, category) = if days > 0 {
        (
            format!("{days}d {hours}h {minutes}m remaining"),
            UrgencyCategory::Active,
        )
    } else if hours > 0 {
        let category = if hours < 2 {
            UrgencyCategory::Urgent
        } else {
            UrgencyCategory::Active
        };
        (format!("{hours}h {minutes}m remaining"), category)
    } else if minutes > 0 {
        (format!("{minutes}m remaining"), UrgencyCategory::Urgent)
    } else {
        ("Due soon".to_string(), UrgencyCategory::Urgent)
    };

    TimeInfo { text, category }
}

/// Same as [`compute_time_info`] for a raw backend value. Unparsable input
/// renders as "Unknown" instead of failing.
pub fn time_info_from_str(raw: &str, now: &DateTime<FixedOffset>) -> TimeInfo {
    match parse_timestamp(raw, now) {
        Some(end) => compute_time_info(Some(end), now),
        None => {
            warn!("could not parse end date {raw:?}");
            unknown()
        }
    }
}

/// Parses an ISO-8601 style timestamp. Values without an offset are read as
/// wall-clock time in `reference`'s offset.
pub fn parse_timestamp(raw: &str, reference: &DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    reference
        .offset()
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Relative phrase such as "3 hours ago". Buckets follow the usual
/// "distance in words" thresholds without the "about" qualifier. From two
/// months on, years are counted in calendar months between the two instants.
pub fn describe_elapsed(since: &DateTime<FixedOffset>, now: &DateTime<FixedOffset>) -> String {
    let elapsed = now.signed_duration_since(*since);
    let minutes = (elapsed.num_seconds() as f64 / 60.0).round() as i64;

    let phrase = if minutes < 1 {
        "less than a minute".to_string()
    } else if minutes < 2 {
        "1 minute".to_string()
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if minutes < 90 {
        "1 hour".to_string()
    } else if minutes < MINUTES_IN_DAY {
        plural(rounded_div(minutes, 60), "hour")
    } else if minutes < 2_520 {
        "1 day".to_string()
    } else if minutes < MINUTES_IN_MONTH {
        plural(rounded_div(minutes, MINUTES_IN_DAY), "day")
    } else if minutes < 2 * MINUTES_IN_MONTH {
        plural(rounded_div(minutes, MINUTES_IN_MONTH), "month")
    } else {
        let months = calendar_months_between(since, now);
        if months < 12 {
            plural(rounded_div(minutes, MINUTES_IN_MONTH), "month")
        } else {
            let years = months / 12;
            match months % 12 {
                0..=2 => plural(years, "year"),
                3..=8 => format!("over {}", plural(years, "year")),
                _ => format!("almost {}", plural(years + 1, "year")),
            }
        }
    };

    format!("{phrase} ago")
}

/// Full calendar months from `earlier` to `later`; a month only counts once
/// its day and time of day have been reached again.
fn calendar_months_between(earlier: &DateTime<FixedOffset>, later: &DateTime<FixedOffset>) -> i64 {
    let later = later.with_timezone(&earlier.timezone());
    let mut months = i64::from(later.year() - earlier.year()) * 12 + i64::from(later.month())
        - i64::from(earlier.month());

    let overshoots = u32::try_from(months)
        .ok()
        .and_then(|count| earlier.checked_add_months(Months::new(count)))
        .is_some_and(|shifted| shifted > later);
    if months > 0 && overshoots {
        months -= 1;
    }

    months.max(0)
}

fn rounded_div(value: i64, divisor: i64) -> i64 {
    (value as f64 / divisor as f64).round() as i64
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

fn unknown() -> TimeInfo {
    TimeInfo {
        text: "Unknown".to_string(),
        category: UrgencyCategory::Active,
    }
}
