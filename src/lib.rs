//! Return-status, ranking and KPI logic for a car-rental back office.
//!
//! The computations are pure functions over already-fetched bookings and
//! take the current time as a parameter. `db` and `snapshot` load the data
//! they run on.

pub mod commission;
pub mod dashboard;
pub mod db;
pub mod models;
pub mod records;
pub mod report;
pub mod snapshot;
pub mod sorting;
pub mod status;
