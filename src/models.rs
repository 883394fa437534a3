use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Pending => "pending",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "pending" => Ok(BookingStatus::Pending),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(PaymentStatus::Paid),
            "pending" => Ok(PaymentStatus::Pending),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking after normalization. Timestamps that were missing or
/// unparsable upstream are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub vehicle_id: Option<String>,
    pub vehicle_name: String,
    pub agent_id: Option<String>,
    pub agent_name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub commission_rate: Option<f64>,
    pub commission_amount: Option<f64>,
    pub pickup_location: String,
    pub return_location: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl Agent {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Ordered by how soon a booking needs attention: `Expired` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UrgencyCategory {
    Expired,
    Urgent,
    ReturningToday,
    Active,
}

impl UrgencyCategory {
    pub const ALL: [UrgencyCategory; 4] = [
        UrgencyCategory::Expired,
        UrgencyCategory::Urgent,
        UrgencyCategory::ReturningToday,
        UrgencyCategory::Active,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            UrgencyCategory::Expired => "expired",
            UrgencyCategory::Urgent => "urgent",
            UrgencyCategory::ReturningToday => "returning-today",
            UrgencyCategory::Active => "active",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeInfo {
    pub text: String,
    pub category: UrgencyCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentAggregate {
    pub agent_id: String,
    pub agent_name: String,
    pub booking_count: usize,
    pub total_sales: f64,
    pub total_commission: f64,
    pub performance_score: f64,
    pub rank: usize,
}

/// Sums over a whole leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamTotals {
    pub booking_count: usize,
    pub total_sales: f64,
    pub total_commission: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommissionStats {
    pub total_commission: f64,
    pub total_sales: f64,
    pub completed_bookings: usize,
    pub average_commission_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleUsage {
    pub vehicle_id: String,
    pub vehicle_name: String,
    pub booking_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: UrgencyCategory,
    pub count: usize,
    pub total_amount: f64,
}

/// Everything one invocation works on, fetched fresh each time.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    pub agents: Vec<Agent>,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiSummary {
    pub bookings: usize,
    pub bookings_change: i64,
    pub revenue: f64,
    pub revenue_change: i64,
    pub returning_soon: usize,
}
