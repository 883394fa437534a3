use std::collections::HashMap;

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, Utc};
use clap::ValueEnum;

use crate::commission::{created_between, month_bounds};
use crate::models::{Booking, KpiSummary, VehicleUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Period {
    #[default]
    Today,
    Week,
    Month,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    /// Current window up to `today` and the window it is compared against.
    /// Weeks start on Sunday.
    pub fn windows(self, today: NaiveDate) -> Option<(DateRange, DateRange)> {
        match self {
            Period::Today => {
                let yesterday = today.pred_opt()?;
                Some((
                    DateRange { from: today, to: today },
                    DateRange {
                        from: yesterday,
                        to: yesterday,
                    },
                ))
            }
            Period::Week => {
                let offset = Days::new(u64::from(today.weekday().num_days_from_sunday()));
                let start = today.checked_sub_days(offset)?;
                let week = Days::new(7);
                Some((
                    DateRange { from: start, to: today },
                    DateRange {
                        from: start.checked_sub_days(week)?,
                        to: today.checked_sub_days(week)?,
                    },
                ))
            }
            Period::Month => {
                let (start, _) = month_bounds(today)?;
                let (previous_start, previous_end) = month_bounds(start.pred_opt()?)?;
                Some((
                    DateRange { from: start, to: today },
                    DateRange {
                        from: previous_start,
                        to: previous_end,
                    },
                ))
            }
        }
    }
}

/// Whole-number percentage change; a zero baseline counts as +100%.
/// Halves round up, so -62.5 becomes -62.
pub fn percent_change(current: f64, previous: f64) -> i64 {
    if previous == 0.0 {
        return 100;
    }
    ((current - previous) / previous * 100.0 + 0.5).floor() as i64
}

/// Bookings ending within a day either side of `now`.
pub fn returning_soon(bookings: &[Booking], now: &DateTime<FixedOffset>) -> usize {
    let from = (*now - Duration::hours(24)).with_timezone(&Utc);
    let to = (*now + Duration::hours(24)).with_timezone(&Utc);
    bookings
        .iter()
        .filter_map(|booking| booking.end_date)
        .filter(|end| *end >= from && *end <= to)
        .count()
}

pub fn summarize(
    bookings: &[Booking],
    now: &DateTime<FixedOffset>,
    period: Period,
) -> Option<KpiSummary> {
    let (current, previous) = period.windows(now.date_naive())?;
    let offset = now.offset();

    let in_window = |range: DateRange| -> (usize, f64) {
        bookings
            .iter()
            .filter(|b| created_between(b, range.from, range.to, offset))
            .fold((0, 0.0), |(count, revenue), b| (count + 1, revenue + b.amount))
    };

    let (current_count, current_revenue) = in_window(current);
    let (previous_count, previous_revenue) = in_window(previous);

    Some(KpiSummary {
        bookings: current_count,
        bookings_change: percent_change(current_count as f64, previous_count as f64),
        revenue: current_revenue,
        revenue_change: percent_change(current_revenue, previous_revenue),
        returning_soon: returning_soon(bookings, now),
    })
}

/// Most-booked vehicles, ties by name.
pub fn top_vehicles(bookings: &[Booking], limit: usize) -> Vec<VehicleUsage> {
    let mut counts: HashMap<&str, VehicleUsage> = HashMap::new();

    for booking in bookings {
        let Some(vehicle_id) = booking.vehicle_id.as_deref() else {
            continue;
        };
        counts
            .entry(vehicle_id)
            .or_insert_with(|| VehicleUsage {
                vehicle_id: vehicle_id.to_string(),
                vehicle_name: booking.vehicle_name.clone(),
                booking_count: 0,
            })
            .booking_count += 1;
    }

    let mut values: Vec<VehicleUsage> = counts.into_values().collect();
    values.sort_by(|a, b| {
        b.booking_count
            .cmp(&a.booking_count)
            .then_with(|| a.vehicle_name.cmp(&b.vehicle_name))
    });
    values.truncate(limit);
    values
}
