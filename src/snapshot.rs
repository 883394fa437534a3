use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use log::info;
use serde::Deserialize;

use crate::models::DataSet;
use crate::records::{normalize_agents, normalize_bookings, RawBooking, RawPerson};

/// JSON export of the hosted backend's `agents` and `bookings` tables, with
/// related rows embedded the way the backend client returns them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SnapshotFile {
    agents: Vec<RawPerson>,
    bookings: Vec<RawBooking>,
}

pub fn load_snapshot(path: &Path, reference: &DateTime<FixedOffset>) -> anyhow::Result<DataSet> {
    let file = File::open(path)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;
    let parsed: SnapshotFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("snapshot {} is not valid JSON", path.display()))?;
    let data = into_dataset(parsed, reference);
    info!(
        "loaded {} agents and {} bookings from {}",
        data.agents.len(),
        data.bookings.len(),
        path.display()
    );
    Ok(data)
}

pub fn parse_snapshot(json: &str, reference: &DateTime<FixedOffset>) -> anyhow::Result<DataSet> {
    let parsed: SnapshotFile = serde_json::from_str(json).context("snapshot is not valid JSON")?;
    Ok(into_dataset(parsed, reference))
}

fn into_dataset(parsed: SnapshotFile, reference: &DateTime<FixedOffset>) -> DataSet {
    DataSet {
        agents: normalize_agents(parsed.agents),
        bookings: normalize_bookings(parsed.bookings, reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00+01:00").unwrap()
    }

    #[test]
    fn parses_backend_export() {
        let json = r#"{
            "agents": [
                { "id": "a-1", "first_name": "Omar", "last_name": "Benali", "email": "omar@fleet.test" },
                { "first_name": "No", "last_name": "Id" }
            ],
            "bookings": [
                {
                    "id": "b-1",
                    "start_date": "2024-04-28 09:00:00",
                    "end_date": "2024-05-01T18:00:00+01:00",
                    "status": "confirmed",
                    "payment_status": "paid",
                    "amount": 420,
                    "agent_id": "a-1",
                    "clients": [{ "first_name": "Lina", "last_name": "Haddad" }],
                    "vehicles": { "id": "v-9", "brand": "Peugeot", "model": "208" }
                },
                { "id": "b-2", "status": "lost" }
            ]
        }"#;

        let data = parse_snapshot(json, &reference()).unwrap();
        assert_eq!(data.agents.len(), 1);
        assert_eq!(data.bookings.len(), 1);

        let booking = &data.bookings[0];
        assert_eq!(booking.vehicle_name, "Peugeot 208");
        assert_eq!(booking.vehicle_id.as_deref(), Some("v-9"));
        assert_eq!(booking.client_name, "Lina Haddad");
        assert_eq!(booking.amount, 420.0);
        assert_eq!(
            booking.start_date.map(|d| d.to_rfc3339()),
            Some("2024-04-28T08:00:00+00:00".to_string())
        );
    }

    #[test]
    fn loads_demo_snapshot_from_disk() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/snapshot.json");
        let data = load_snapshot(&path, &reference()).unwrap();
        assert_eq!(data.agents.len(), 2);
        assert_eq!(data.bookings.len(), 3);

        let unset = data.bookings.iter().find(|b| b.id == "BK-1003").unwrap();
        assert_eq!(unset.end_date, None);
        assert_eq!(unset.client_name, "Unknown");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let data = parse_snapshot("{}", &reference()).unwrap();
        assert!(data.agents.is_empty());
        assert!(data.bookings.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_snapshot("[1, 2", &reference()).is_err());
    }
}
