use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;

use crate::models::{Booking, UrgencyCategory};
use crate::status::compute_time_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    Id,
    Client,
    Vehicle,
    Agent,
    StartDate,
    EndDate,
    Status,
    Payment,
    Amount,
    PickupLocation,
    ReturnLocation,
    TimeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Case-insensitive match on client, vehicle, booking id and agent.
pub fn filter_bookings(bookings: &[Booking], term: &str) -> Vec<Booking> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return bookings.to_vec();
    }

    bookings
        .iter()
        .filter(|booking| {
            [
                &booking.client_name,
                &booking.vehicle_name,
                &booking.id,
                &booking.agent_name,
            ]
            .iter()
            .any(|value| value.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Returns a sorted copy. `TimeStatus` orders by urgency category first and
/// end date second; the direction applies to both keys.
pub fn sort_bookings(
    bookings: &[Booking],
    field: SortField,
    direction: SortDirection,
    now: &DateTime<FixedOffset>,
) -> Vec<Booking> {
    if field == SortField::TimeStatus {
        let mut keyed: Vec<(UrgencyCategory, &Booking)> = bookings
            .iter()
            .map(|booking| (compute_time_info(booking.end_date, now).category, booking))
            .collect();

        keyed.sort_by(|(a_category, a), (b_category, b)| {
            direction.apply(
                a_category
                    .cmp(b_category)
                    .then_with(|| a.end_date.cmp(&b.end_date)),
            )
        });

        return keyed.into_iter().map(|(_, booking)| booking.clone()).collect();
    }

    let mut sorted = bookings.to_vec();
    sorted.sort_by(|a, b| direction.apply(compare_field(a, b, field)));
    sorted
}

fn compare_field(a: &Booking, b: &Booking, field: SortField) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Client => compare_text(&a.client_name, &b.client_name),
        SortField::Vehicle => compare_text(&a.vehicle_name, &b.vehicle_name),
        SortField::Agent => compare_text(&a.agent_name, &b.agent_name),
        SortField::StartDate => a.start_date.cmp(&b.start_date),
        SortField::EndDate | SortField::TimeStatus => a.end_date.cmp(&b.end_date),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::Payment => a.payment_status.as_str().cmp(b.payment_status.as_str()),
        SortField::Amount => a.amount.total_cmp(&b.amount),
        SortField::PickupLocation => compare_text(&a.pickup_location, &b.pickup_location),
        SortField::ReturnLocation => compare_text(&a.return_location, &b.return_location),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
