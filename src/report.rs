use std::fmt::Write;

use chrono::{DateTime, FixedOffset};

use crate::commission::{
    aggregate_commissions, created_between, month_bounds, target_progress, team_totals, ScoreWeights,
};
use crate::dashboard::top_vehicles;
use crate::models::{Booking, CategorySummary, DataSet, UrgencyCategory};
use crate::sorting::{sort_bookings, SortDirection, SortField};
use crate::status::compute_time_info;

/// Booking count and value per urgency category, in category order.
/// Categories with no bookings are still listed.
pub fn summarize_by_category(
    bookings: &[Booking],
    now: &DateTime<FixedOffset>,
) -> Vec<CategorySummary> {
    let mut summaries: Vec<CategorySummary> = UrgencyCategory::ALL
        .iter()
        .map(|category| CategorySummary {
            category: *category,
            count: 0,
            total_amount: 0.0,
        })
        .collect();

    for booking in bookings {
        let category = compute_time_info(booking.end_date, now).category;
        if let Some(entry) = summaries.iter_mut().find(|s| s.category == category) {
            entry.count += 1;
            entry.total_amount += booking.amount;
        }
    }

    summaries
}

pub fn build_report(data: &DataSet, now: &DateTime<FixedOffset>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Fleet Desk Report");
    let _ = writeln!(
        output,
        "Generated {} ({} bookings, {} agents)",
        now.format("%Y-%m-%d %H:%M"),
        data.bookings.len(),
        data.agents.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Return Status");

    if data.bookings.is_empty() {
        let _ = writeln!(output, "No bookings recorded.");
    } else {
        for summary in summarize_by_category(&data.bookings, now) {
            let _ = writeln!(
                output,
                "- {}: {} bookings ({:.2} in value)",
                summary.category.label(),
                summary.count,
                summary.total_amount
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");

    let attention: Vec<Booking> =
        sort_bookings(&data.bookings, SortField::TimeStatus, SortDirection::Asc, now)
            .into_iter()
            .filter(|booking| {
                matches!(
                    compute_time_info(booking.end_date, now).category,
                    UrgencyCategory::Expired | UrgencyCategory::Urgent
                )
            })
            .collect();

    if attention.is_empty() {
        let _ = writeln!(output, "Nothing overdue or due within two hours.");
    } else {
        for booking in attention.iter().take(10) {
            let info = compute_time_info(booking.end_date, now);
            let _ = writeln!(
                output,
                "- {} {} ({}, agent {}): {}",
                booking.id, booking.client_name, booking.vehicle_name, booking.agent_name, info.text
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Agent Leaderboard (month to date)");

    let month_bookings: Vec<Booking> = match month_bounds(now.date_naive()) {
        Some((from, to)) => data
            .bookings
            .iter()
            .filter(|b| created_between(b, from, to, now.offset()))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    let leaderboard = aggregate_commissions(&month_bookings, &data.agents, &ScoreWeights::default());

    if leaderboard.is_empty() {
        let _ = writeln!(output, "No agents on the roster.");
    } else {
        let team = team_totals(&leaderboard);
        let _ = writeln!(
            output,
            "Team: {} bookings, sales {:.2}, commission {:.2}",
            team.booking_count, team.total_sales, team.total_commission
        );
        let _ = writeln!(output);
        for agent in leaderboard.iter().take(10) {
            let _ = writeln!(
                output,
                "{}. {} - {} bookings, sales {:.2}, commission {:.2}, score {:.1}k, {:.0}% of target",
                agent.rank,
                agent.agent_name,
                agent.booking_count,
                agent.total_sales,
                agent.total_commission,
                agent.performance_score / 1000.0,
                target_progress(agent)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Vehicles");

    let vehicles = top_vehicles(&data.bookings, 5);
    if vehicles.is_empty() {
        let _ = writeln!(output, "No vehicle bookings recorded.");
    } else {
        for vehicle in vehicles {
            let _ = writeln!(
                output,
                "- {}: {} bookings",
                vehicle.vehicle_name, vehicle.booking_count
            );
        }
    }

    let mut recent = data.bookings.clone();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Bookings");

    if recent.is_empty() {
        let _ = writeln!(output, "No bookings recorded.");
    } else {
        for booking in recent.iter().take(5) {
            let created = booking
                .created_at
                .map(|c| c.with_timezone(&now.timezone()).format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            let _ = writeln!(
                output,
                "- {} on {}: {} booked {} ({}, {:.2})",
                booking.id,
                created,
                booking.client_name,
                booking.vehicle_name,
                booking.status,
                booking.amount
            );
        }
    }

    output
}
