use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use fleet_desk::commission::{self, LeaderboardField};
use fleet_desk::dashboard::{self, Period};
use fleet_desk::models::DataSet;
use fleet_desk::sorting::{self, SortDirection, SortField};
use fleet_desk::{db, report, snapshot, status};

#[derive(Parser)]
#[command(name = "fleet-desk")]
#[command(about = "Booking return status and agent commissions for the rental fleet", long_about = None)]
struct Cli {
    /// Read a JSON export instead of connecting to the database
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Evaluate as of this RFC 3339 timestamp instead of the local clock
    #[arg(long, global = true, value_parser = parse_now)]
    now: Option<DateTime<FixedOffset>>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo agents, clients, vehicles and bookings
    Seed,
    /// Import bookings from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List bookings with their return status
    Bookings {
        #[arg(long, value_enum, default_value_t = SortField::TimeStatus)]
        sort: SortField,
        #[arg(long, value_enum, default_value_t = SortDirection::Asc)]
        direction: SortDirection,
        /// Flip the chosen direction
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Rank agents by performance score
    Leaderboard {
        /// First creation day counted (defaults to the start of this month)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last creation day counted (defaults to the end of this month)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = LeaderboardField::Score)]
        sort: LeaderboardField,
        #[arg(long, value_enum, default_value_t = SortDirection::Desc)]
        direction: SortDirection,
        /// Flip the chosen direction
        #[arg(long)]
        reverse: bool,
    },
    /// Commission statistics for one agent
    AgentStats {
        /// Agent id or email
        #[arg(long)]
        agent: String,
    },
    /// Period KPIs and most-booked vehicles
    Dashboard {
        #[arg(long, value_enum, default_value_t = Period::Today)]
        period: Period,
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_now(value: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(value).map_err(|err| format!("invalid timestamp: {err}"))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the fleet Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    info!("connected to Postgres");
    Ok(pool)
}

async fn load_data(
    snapshot_path: Option<&Path>,
    now: &DateTime<FixedOffset>,
) -> anyhow::Result<DataSet> {
    match snapshot_path {
        Some(path) => snapshot::load_snapshot(path, now),
        None => {
            let pool = connect().await?;
            db::load_dataset(&pool).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let now = cli.now.unwrap_or_else(|| Local::now().fixed_offset());
    let snapshot_path = cli.snapshot.as_deref();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            let inserted = db::seed(&pool, now.with_timezone(&Utc)).await?;
            println!("Seed data inserted ({inserted} new bookings).");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv, &now).await?;
            println!("Inserted {inserted} bookings from {}.", csv.display());
        }
        Commands::Bookings {
            sort,
            direction,
            reverse,
            search,
            limit,
        } => {
            let direction = if reverse { direction.toggle() } else { direction };
            let data = load_data(snapshot_path, &now).await?;
            let filtered = sorting::filter_bookings(&data.bookings, search.as_deref().unwrap_or(""));
            let sorted = sorting::sort_bookings(&filtered, sort, direction, &now);

            if sorted.is_empty() {
                println!("No bookings found.");
                return Ok(());
            }

            println!("Bookings as of {}:", now.format("%Y-%m-%d %H:%M"));
            for booking in sorted.iter().take(limit) {
                let info = status::compute_time_info(booking.end_date, &now);
                println!(
                    "- {} | {} | {} | {} | {} / {} | {:.2} | {} [{}]",
                    booking.id,
                    booking.client_name,
                    booking.vehicle_name,
                    booking.agent_name,
                    booking.status,
                    booking.payment_status,
                    booking.amount,
                    info.text,
                    info.category.label()
                );
            }
        }
        Commands::Leaderboard {
            from,
            to,
            sort,
            direction,
            reverse,
        } => {
            let direction = if reverse { direction.toggle() } else { direction };
            let (month_start, month_end) =
                commission::month_bounds(now.date_naive()).context("invalid current month")?;
            let from = from.unwrap_or(month_start);
            let to = to.unwrap_or(month_end);

            let data = load_data(snapshot_path, &now).await?;
            let in_range: Vec<_> = data
                .bookings
                .iter()
                .filter(|b| commission::created_between(b, from, to, now.offset()))
                .cloned()
                .collect();
            let ranked = commission::aggregate_commissions(
                &in_range,
                &data.agents,
                &commission::ScoreWeights::default(),
            );

            if ranked.is_empty() {
                println!("No agents on the roster.");
                return Ok(());
            }

            let team = commission::team_totals(&ranked);
            println!("Agent leaderboard for bookings created {from} to {to}:");
            println!(
                "Team: {} bookings, sales {:.2}, commission {:.2}",
                team.booking_count, team.total_sales, team.total_commission
            );
            for agent in commission::sort_leaderboard(&ranked, sort, direction) {
                println!(
                    "#{} {} - {} bookings, sales {:.2}, commission {:.2}, score {:.1}k, {:.0}% of target",
                    agent.rank,
                    agent.agent_name,
                    agent.booking_count,
                    agent.total_sales,
                    agent.total_commission,
                    agent.performance_score / 1000.0,
                    commission::target_progress(&agent)
                );
            }
        }
        Commands::AgentStats { agent } => {
            let data = load_data(snapshot_path, &now).await?;
            let found = data
                .agents
                .iter()
                .find(|a| {
                    a.id == agent
                        || a
                            .email
                            .as_deref()
                            .is_some_and(|email| email.eq_ignore_ascii_case(&agent))
                })
                .with_context(|| format!("no agent matches {agent:?}"))?;

            let own: Vec<_> = data
                .bookings
                .iter()
                .filter(|b| b.agent_id.as_deref() == Some(found.id.as_str()))
                .cloned()
                .collect();
            let stats = commission::agent_stats(&own);

            println!("{} ({} bookings)", found.display_name(), own.len());
            println!("- total sales: {:.2}", stats.total_sales);
            println!("- total commission: {:.2}", stats.total_commission);
            println!("- completed bookings: {}", stats.completed_bookings);
            println!(
                "- average commission rate: {:.1}%",
                stats.average_commission_rate * 100.0
            );
        }
        Commands::Dashboard { period, top } => {
            let data = load_data(snapshot_path, &now).await?;
            let summary = dashboard::summarize(&data.bookings, &now, period)
                .context("could not compute period windows")?;

            println!("Dashboard ({period:?}) as of {}:", now.format("%Y-%m-%d %H:%M"));
            println!(
                "- bookings: {} ({:+}% vs previous period)",
                summary.bookings, summary.bookings_change
            );
            println!(
                "- revenue: {:.2} ({:+}% vs previous period)",
                summary.revenue, summary.revenue_change
            );
            println!("- cars returning within 24h: {}", summary.returning_soon);

            let vehicles = dashboard::top_vehicles(&data.bookings, top);
            if !vehicles.is_empty() {
                println!("Most booked vehicles:");
                for vehicle in vehicles {
                    println!("- {}: {} bookings", vehicle.vehicle_name, vehicle.booking_count);
                }
            }
        }
        Commands::Report { out } => {
            let data = load_data(snapshot_path, &now).await?;
            let report = report::build_report(&data, &now);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
