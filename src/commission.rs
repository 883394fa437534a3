use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Datelike, FixedOffset, Months, NaiveDate};
use clap::ValueEnum;
use log::{debug, warn};

use crate::models::{Agent, AgentAggregate, Booking, BookingStatus, CommissionStats, TeamTotals};
use crate::sorting::SortDirection;

/// Applied when a booking carries neither a commission amount nor a rate.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.1;

/// Sales each agent is expected to reach over the leaderboard window.
pub const SALES_TARGET: f64 = 10_000.0;

/// Weights of the leaderboard score: 60% sales, 30% bookings (each booking
/// counted as `booking_value`), 10% commission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub sales: f64,
    pub bookings: f64,
    pub booking_value: f64,
    pub commission: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            sales: 0.6,
            bookings: 0.3,
            booking_value: 1000.0,
            commission: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn score(&self, total_sales: f64, booking_count: usize, total_commission: f64) -> f64 {
        total_sales * self.sales
            + booking_count as f64 * self.booking_value * self.bookings
            + total_commission * self.commission
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LeaderboardField {
    Bookings,
    Sales,
    Commission,
    Score,
}

pub fn commission_rate(booking: &Booking) -> f64 {
    booking.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE)
}

pub fn booking_commission(booking: &Booking) -> f64 {
    booking
        .commission_amount
        .unwrap_or_else(|| booking.amount * commission_rate(booking))
}

/// One aggregate per roster agent, ranked by performance score. Equal scores
/// are ordered by agent id so ranks are stable between runs.
pub fn aggregate_commissions(
    bookings: &[Booking],
    agents: &[Agent],
    weights: &ScoreWeights,
) -> Vec<AgentAggregate> {
    let mut aggregates: HashMap<&str, AgentAggregate> = agents
        .iter()
        .map(|agent| {
            (
                agent.id.as_str(),
                AgentAggregate {
                    agent_id: agent.id.clone(),
                    agent_name: agent.display_name(),
                    booking_count: 0,
                    total_sales: 0.0,
                    total_commission: 0.0,
                    performance_score: 0.0,
                    rank: 0,
                },
            )
        })
        .collect();

    for booking in bookings {
        let Some(agent_id) = booking.agent_id.as_deref() else {
            debug!("booking {} has no agent, not counted", booking.id);
            continue;
        };
        let Some(entry) = aggregates.get_mut(agent_id) else {
            warn!(
                "booking {} references unknown agent {agent_id}, not counted",
                booking.id
            );
            continue;
        };

        entry.booking_count += 1;
        entry.total_sales += booking.amount;
        entry.total_commission += booking_commission(booking);
    }

    let mut values: Vec<AgentAggregate> = aggregates
        .into_values()
        .map(|mut aggregate| {
            aggregate.performance_score = weights.score(
                aggregate.total_sales,
                aggregate.booking_count,
                aggregate.total_commission,
            );
            aggregate
        })
        .collect();

    values.sort_by(|a, b| {
        b.performance_score
            .total_cmp(&a.performance_score)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    for (index, aggregate) in values.iter_mut().enumerate() {
        aggregate.rank = index + 1;
    }

    values
}

/// Re-orders a ranked leaderboard for display. Ranks are not recomputed.
pub fn sort_leaderboard(
    aggregates: &[AgentAggregate],
    field: LeaderboardField,
    direction: SortDirection,
) -> Vec<AgentAggregate> {
    let mut sorted = aggregates.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = match field {
            LeaderboardField::Bookings => a.booking_count.cmp(&b.booking_count),
            LeaderboardField::Sales => a.total_sales.total_cmp(&b.total_sales),
            LeaderboardField::Commission => a.total_commission.total_cmp(&b.total_commission),
            LeaderboardField::Score => a.performance_score.total_cmp(&b.performance_score),
        };
        match direction.apply(ordering) {
            Ordering::Equal => a.rank.cmp(&b.rank),
            other => other,
        }
    });
    sorted
}

pub fn team_totals(aggregates: &[AgentAggregate]) -> TeamTotals {
    aggregates.iter().fold(
        TeamTotals {
            booking_count: 0,
            total_sales: 0.0,
            total_commission: 0.0,
        },
        |mut totals, aggregate| {
            totals.booking_count += aggregate.booking_count;
            totals.total_sales += aggregate.total_sales;
            totals.total_commission += aggregate.total_commission;
            totals
        },
    )
}

/// Percentage of [`SALES_TARGET`] reached, capped at 100.
pub fn target_progress(aggregate: &AgentAggregate) -> f64 {
    (aggregate.total_sales / SALES_TARGET * 100.0).clamp(0.0, 100.0)
}

/// Totals for a single agent's own bookings.
pub fn agent_stats(bookings: &[Booking]) -> CommissionStats {
    if bookings.is_empty() {
        return CommissionStats {
            total_commission: 0.0,
            total_sales: 0.0,
            completed_bookings: 0,
            average_commission_rate: DEFAULT_COMMISSION_RATE,
        };
    }

    let total_sales: f64 = bookings.iter().map(|b| b.amount).sum();
    let total_commission: f64 = bookings.iter().map(booking_commission).sum();
    let completed_bookings = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
        .count();
    let average_commission_rate =
        bookings.iter().map(commission_rate).sum::<f64>() / bookings.len() as f64;

    CommissionStats {
        total_commission,
        total_sales,
        completed_bookings,
        average_commission_rate,
    }
}

/// Inclusive window on the booking's creation date, read in `offset`.
pub fn created_between(
    booking: &Booking,
    from: NaiveDate,
    to: NaiveDate,
    offset: &FixedOffset,
) -> bool {
    booking
        .created_at
        .map(|created| {
            let date = created.with_timezone(offset).date_naive();
            date >= from && date <= to
        })
        .unwrap_or(false)
}

/// First and last day of the month containing `today`.
pub fn month_bounds(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = today.with_day(1)?;
    let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{sample_agent, sample_booking, utc};

    fn sale(id: &str, agent_id: &str, amount: f64, commission: Option<f64>) -> Booking {
        let mut booking = sample_booking(id);
        booking.agent_id = Some(agent_id.to_string());
        booking.amount = amount;
        booking.commission_amount = commission;
        booking
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn aggregates_totals_and_weighted_score() {
        let agents = vec![sample_agent("x", "Omar", "Benali")];
        let bookings = vec![
            sale("b1", "x", 100.0, Some(10.0)),
            sale("b2", "x", 200.0, Some(20.0)),
        ];

        let result = aggregate_commissions(&bookings, &agents, &ScoreWeights::default());
        assert_eq!(result.len(), 1);
        let agent = &result[0];
        assert_eq!(agent.agent_name, "Omar Benali");
        assert_eq!(agent.booking_count, 2);
        assert!(close(agent.total_sales, 300.0));
        assert!(close(agent.total_commission, 30.0));
        assert!(close(agent.performance_score, 783.0));
        assert_eq!(agent.rank, 1);
    }

    #[test]
    fn ranks_follow_score_with_id_tie_break() {
        let agents = vec![
            sample_agent("c", "Chadi", "R"),
            sample_agent("b", "Badr", "R"),
            sample_agent("a", "Amal", "R"),
            sample_agent("idle", "Idle", "R"),
        ];
        let bookings = vec![
            sale("1", "a", 100.0, Some(10.0)),
            sale("2", "a", 200.0, Some(20.0)),
            // 500 * 0.6 + 300 + 0 = 600; equal with c.
            sale("3", "b", 500.0, Some(0.0)),
            sale("4", "c", 500.0, Some(0.0)),
        ];

        let result = aggregate_commissions(&bookings, &agents, &ScoreWeights::default());
        let order: Vec<(&str, usize)> = result
            .iter()
            .map(|a| (a.agent_id.as_str(), a.rank))
            .collect();
        assert_eq!(order, vec![("a", 1), ("b", 2), ("c", 3), ("idle", 4)]);
        assert_eq!(result[3].booking_count, 0);
        assert!(close(result[3].performance_score, 0.0));
    }

    #[test]
    fn missing_commission_uses_rate_or_default() {
        let agents = vec![sample_agent("x", "Omar", "Benali")];
        let mut with_rate = sale("b1", "x", 1000.0, None);
        with_rate.commission_rate = Some(0.08);
        let without_rate = sale("b2", "x", 500.0, None);

        let result =
            aggregate_commissions(&[with_rate, without_rate], &agents, &ScoreWeights::default());
        assert!(close(result[0].total_commission, 80.0 + 50.0));
    }

    #[test]
    fn unknown_and_missing_agents_are_skipped() {
        let agents = vec![sample_agent("x", "Omar", "Benali")];
        let mut orphan = sale("b2", "x", 999.0, None);
        orphan.agent_id = None;
        let bookings = vec![
            sale("b1", "x", 100.0, Some(10.0)),
            sale("b3", "ghost", 5000.0, Some(500.0)),
            orphan,
        ];

        let result = aggregate_commissions(&bookings, &agents, &ScoreWeights::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].booking_count, 1);
        assert!(close(result[0].total_sales, 100.0));
    }

    #[test]
    fn leaderboard_resort_keeps_ranks() {
        let agents = vec![sample_agent("a", "Amal", "R"), sample_agent("b", "Badr", "R")];
        let bookings = vec![
            sale("1", "a", 5000.0, Some(500.0)),
            sale("2", "b", 100.0, Some(10.0)),
            sale("3", "b", 100.0, Some(10.0)),
        ];
        let ranked = aggregate_commissions(&bookings, &agents, &ScoreWeights::default());
        assert_eq!(ranked[0].agent_id, "a");

        let by_count = sort_leaderboard(&ranked, LeaderboardField::Bookings, SortDirection::Desc);
        assert_eq!(by_count[0].agent_id, "b");
        assert_eq!(by_count[0].rank, 2);

        let by_sales = sort_leaderboard(&ranked, LeaderboardField::Sales, SortDirection::Asc);
        assert_eq!(by_sales[0].agent_id, "b");
    }

    #[test]
    fn team_totals_sum_every_agent() {
        let agents = vec![
            sample_agent("a", "Amal", "R"),
            sample_agent("b", "Badr", "R"),
            sample_agent("idle", "Idle", "R"),
        ];
        let bookings = vec![
            sale("1", "a", 1000.0, Some(100.0)),
            sale("2", "b", 400.0, None),
            sale("3", "b", 600.0, Some(45.0)),
        ];
        let ranked = aggregate_commissions(&bookings, &agents, &ScoreWeights::default());

        let totals = team_totals(&ranked);
        assert_eq!(totals.booking_count, 3);
        assert!(close(totals.total_sales, 2000.0));
        assert!(close(totals.total_commission, 100.0 + 40.0 + 45.0));

        let empty = team_totals(&[]);
        assert_eq!(empty.booking_count, 0);
        assert!(close(empty.total_sales, 0.0));
    }

    #[test]
    fn target_progress_is_capped() {
        let agents = vec![sample_agent("a", "Amal", "R"), sample_agent("b", "Badr", "R")];
        let bookings = vec![
            sale("1", "a", 2500.0, None),
            sale("2", "b", 9000.0, None),
            sale("3", "b", 6000.0, None),
        ];
        let ranked = aggregate_commissions(&bookings, &agents, &ScoreWeights::default());
        let progress = |id: &str| {
            let aggregate = ranked.iter().find(|a| a.agent_id == id).unwrap();
            target_progress(aggregate)
        };

        assert!(close(progress("a"), 25.0));
        assert!(close(progress("b"), 100.0));
    }

    #[test]
    fn agent_stats_summarize_own_bookings() {
        let mut done = sale("1", "x", 400.0, None);
        done.status = BookingStatus::Completed;
        done.commission_rate = Some(0.2);
        let open = sale("2", "x", 100.0, Some(15.0));

        let stats = agent_stats(&[done, open]);
        assert!(close(stats.total_sales, 500.0));
        assert!(close(stats.total_commission, 80.0 + 15.0));
        assert_eq!(stats.completed_bookings, 1);
        assert!(close(stats.average_commission_rate, (0.2 + 0.1) / 2.0));

        let empty = agent_stats(&[]);
        assert_eq!(empty.completed_bookings, 0);
        assert!(close(empty.average_commission_rate, DEFAULT_COMMISSION_RATE));
    }

    #[test]
    fn creation_window_is_inclusive_and_offset_aware() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

        let mut booking = sample_booking("b");
        booking.created_at = Some(utc("2024-02-29T23:00:00Z"));
        assert!(created_between(&booking, from, to, &offset));

        booking.created_at = Some(utc("2024-03-31T22:30:00Z"));
        assert!(!created_between(&booking, from, to, &offset));

        booking.created_at = None;
        assert!(!created_between(&booking, from, to, &offset));
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, end) = month_bounds(NaiveDate::from_ymd_opt(2023, 12, 3).unwrap()).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }
}
