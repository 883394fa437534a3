//! Normalization of loosely shaped backend rows.
//!
//! The hosted backend returns optional fields everywhere and nests related
//! rows either as an object or as a one-element list. Everything is turned
//! into the strict entities of `models` here and nowhere else.

use chrono::{DateTime, FixedOffset, Utc};
use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Agent, Booking, BookingStatus, PaymentStatus};
use crate::status::parse_timestamp;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("{kind} record is missing its id")]
    MissingId { kind: &'static str },

    #[error("booking {id}: invalid {field} value {value:?}")]
    InvalidValue {
        id: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::Many(values) => values.first(),
            OneOrMany::One(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    fn value(&self) -> Option<f64> {
        match self {
            LooseNumber::Number(value) => Some(*value),
            LooseNumber::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPerson {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawVehicle {
    pub id: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBooking {
    pub id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub amount: Option<LooseNumber>,
    pub client_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub agent_id: Option<String>,
    pub commission_rate: Option<LooseNumber>,
    pub commission_amount: Option<LooseNumber>,
    pub pickup_location: Option<String>,
    pub return_location: Option<String>,
    pub clients: Option<OneOrMany<RawPerson>>,
    pub vehicles: Option<OneOrMany<RawVehicle>>,
    pub agents: Option<OneOrMany<RawPerson>>,
}

pub fn parse_booking_status(id: &str, raw: Option<&str>) -> Result<BookingStatus, RecordError> {
    match raw {
        None => Ok(BookingStatus::Pending),
        Some(value) => value.parse().map_err(|value| RecordError::InvalidValue {
            id: id.to_string(),
            field: "status",
            value,
        }),
    }
}

pub fn parse_payment_status(id: &str, raw: Option<&str>) -> Result<PaymentStatus, RecordError> {
    match raw {
        None => Ok(PaymentStatus::Pending),
        Some(value) => value.parse().map_err(|value| RecordError::InvalidValue {
            id: id.to_string(),
            field: "payment_status",
            value,
        }),
    }
}

pub fn person_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    let name = format!(
        "{} {}",
        first_name.unwrap_or_default(),
        last_name.unwrap_or_default()
    );
    let name = name.trim();
    if name.is_empty() {
        UNKNOWN.to_string()
    } else {
        name.to_string()
    }
}

pub fn vehicle_display_name(brand: Option<&str>, model: Option<&str>) -> String {
    person_name(brand, model)
}

pub fn normalize_agent(raw: RawPerson) -> Result<Agent, RecordError> {
    let id = non_empty(raw.id).ok_or(RecordError::MissingId { kind: "agent" })?;
    Ok(Agent {
        id,
        first_name: raw.first_name.unwrap_or_default(),
        last_name: raw.last_name.unwrap_or_default(),
        email: non_empty(raw.email),
    })
}

pub fn normalize_booking(
    raw: RawBooking,
    reference: &DateTime<FixedOffset>,
) -> Result<Booking, RecordError> {
    let id = non_empty(raw.id).ok_or(RecordError::MissingId { kind: "booking" })?;
    let status = parse_booking_status(&id, raw.status.as_deref())?;
    let payment_status = parse_payment_status(&id, raw.payment_status.as_deref())?;
    let amount = number(&id, "amount", raw.amount.as_ref())?.unwrap_or(0.0);
    let commission_rate = number(&id, "commission_rate", raw.commission_rate.as_ref())?;
    let commission_amount = number(&id, "commission_amount", raw.commission_amount.as_ref())?;

    let client = raw.clients.as_ref().and_then(OneOrMany::first);
    let vehicle = raw.vehicles.as_ref().and_then(OneOrMany::first);
    let agent = raw.agents.as_ref().and_then(OneOrMany::first);

    let client_name = client
        .map(|c| person_name(c.first_name.as_deref(), c.last_name.as_deref()))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let vehicle_name = vehicle
        .map(|v| vehicle_display_name(v.brand.as_deref(), v.model.as_deref()))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let agent_name = agent
        .map(|a| person_name(a.first_name.as_deref(), a.last_name.as_deref()))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let client_id = non_empty(raw.client_id).or_else(|| client.and_then(|c| c.id.clone()));
    let vehicle_id = non_empty(raw.vehicle_id).or_else(|| vehicle.and_then(|v| v.id.clone()));
    let agent_id = non_empty(raw.agent_id).or_else(|| agent.and_then(|a| a.id.clone()));

    Ok(Booking {
        start_date: timestamp(&id, "start_date", raw.start_date.as_deref(), reference),
        end_date: timestamp(&id, "end_date", raw.end_date.as_deref(), reference),
        created_at: timestamp(&id, "created_at", raw.created_at.as_deref(), reference),
        id,
        client_id,
        client_name,
        vehicle_id,
        vehicle_name,
        agent_id,
        agent_name,
        status,
        payment_status,
        amount,
        commission_rate,
        commission_amount,
        pickup_location: raw.pickup_location.unwrap_or_default(),
        return_location: raw.return_location.unwrap_or_default(),
    })
}

/// Normalizes a batch, logging and dropping rows that cannot be repaired.
pub fn normalize_bookings(
    raws: Vec<RawBooking>,
    reference: &DateTime<FixedOffset>,
) -> Vec<Booking> {
    raws.into_iter()
        .filter_map(|raw| match normalize_booking(raw, reference) {
            Ok(booking) => Some(booking),
            Err(err) => {
                warn!("skipping booking row: {err}");
                None
            }
        })
        .collect()
}

pub fn normalize_agents(raws: Vec<RawPerson>) -> Vec<Agent> {
    raws.into_iter()
        .filter_map(|raw| match normalize_agent(raw) {
            Ok(agent) => Some(agent),
            Err(err) => {
                warn!("skipping agent row: {err}");
                None
            }
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn number(
    id: &str,
    field: &'static str,
    raw: Option<&LooseNumber>,
) -> Result<Option<f64>, RecordError> {
    match raw {
        None => Ok(None),
        Some(value) => value.value().map(Some).ok_or_else(|| RecordError::InvalidValue {
            id: id.to_string(),
            field,
            value: format!("{value:?}"),
        }),
    }
}

fn timestamp(
    id: &str,
    field: &str,
    raw: Option<&str>,
    reference: &DateTime<FixedOffset>,
) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw, reference);
    if parsed.is_none() {
        warn!("booking {id}: unparsable {field} {raw:?}");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap()
    }

    fn raw(value: serde_json::Value) -> RawBooking {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn nested_relations_accept_object_or_list() {
        let booking = normalize_booking(
            raw(json!({
                "id": "b-1",
                "end_date": "2024-05-02T10:00:00Z",
                "status": "confirmed",
                "payment_status": "paid",
                "amount": 250.0,
                "clients": { "id": "c-1", "first_name": "Lina", "last_name": "Haddad" },
                "vehicles": [{ "id": "v-1", "brand": "Dacia", "model": "Logan" }],
                "agents": [{ "id": "a-1", "first_name": "Omar", "last_name": "Benali" }]
            })),
            &reference(),
        )
        .unwrap();

        assert_eq!(booking.client_name, "Lina Haddad");
        assert_eq!(booking.client_id.as_deref(), Some("c-1"));
        assert_eq!(booking.vehicle_name, "Dacia Logan");
        assert_eq!(booking.agent_id.as_deref(), Some("a-1"));
        assert_eq!(booking.agent_name, "Omar Benali");
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, PaymentStatus::Paid);
        assert!(booking.end_date.is_some());
    }

    #[test]
    fn missing_pieces_get_defaults() {
        let booking = normalize_booking(
            raw(json!({ "id": "b-2", "vehicles": [], "amount": null })),
            &reference(),
        )
        .unwrap();

        assert_eq!(booking.client_name, "Unknown");
        assert_eq!(booking.vehicle_name, "Unknown");
        assert_eq!(booking.amount, 0.0);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.commission_rate, None);
        assert_eq!(booking.end_date, None);
    }

    #[test]
    fn malformed_timestamp_becomes_none() {
        let booking = normalize_booking(
            raw(json!({ "id": "b-3", "end_date": "next tuesday", "start_date": "2024-05-01" })),
            &reference(),
        )
        .unwrap();
        assert_eq!(booking.end_date, None);
        assert!(booking.start_date.is_some());
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let booking = normalize_booking(
            raw(json!({ "id": "b-4", "amount": "120.50", "commission_rate": "0.08" })),
            &reference(),
        )
        .unwrap();
        assert_eq!(booking.amount, 120.5);
        assert_eq!(booking.commission_rate, Some(0.08));

        let err = normalize_booking(raw(json!({ "id": "b-5", "amount": "lots" })), &reference())
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidValue { field: "amount", .. }));
    }

    #[test]
    fn rejects_rows_without_id_or_with_unknown_status() {
        let err = normalize_booking(raw(json!({ "amount": 10 })), &reference()).unwrap_err();
        assert_eq!(err, RecordError::MissingId { kind: "booking" });

        let err = normalize_booking(raw(json!({ "id": "b-6", "status": "archived" })), &reference())
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::InvalidValue {
                id: "b-6".to_string(),
                field: "status",
                value: "archived".to_string(),
            }
        );
    }

    #[test]
    fn batch_normalization_drops_bad_rows() {
        let bookings = normalize_bookings(
            vec![
                raw(json!({ "id": "ok" })),
                raw(json!({ "id": "bad", "payment_status": "refunded" })),
            ],
            &reference(),
        );
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].id, "ok");

        let agents = normalize_agents(vec![
            RawPerson {
                id: Some("a-1".to_string()),
                first_name: Some("Sara".to_string()),
                ..Default::default()
            },
            RawPerson::default(),
        ]);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].display_name(), "Sara");
    }
}
