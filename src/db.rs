use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use log::{info, warn};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Agent, Booking, BookingStatus, DataSet, PaymentStatus};
use crate::records::{
    parse_booking_status, parse_payment_status, person_name, vehicle_display_name, RecordError,
};
use crate::status::parse_timestamp;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_agent(
    pool: &PgPool,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO fleet_desk.agents (id, first_name, last_name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_client(
    pool: &PgPool,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO fleet_desk.clients (id, first_name, last_name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_vehicle(
    pool: &PgPool,
    plate_number: &str,
    brand: &str,
    model: &str,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO fleet_desk.vehicles (id, brand, model, plate_number)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (plate_number) DO UPDATE
        SET brand = EXCLUDED.brand, model = EXCLUDED.model
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(brand)
    .bind(model)
    .bind(plate_number)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

struct NewBooking<'a> {
    source_key: &'a str,
    client_id: Uuid,
    vehicle_id: Uuid,
    agent_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: &'a str,
    payment_status: &'a str,
    amount: f64,
    commission_rate: Option<f64>,
    commission_amount: Option<f64>,
    pickup_location: &'a str,
    return_location: &'a str,
}

/// Returns whether a row was written; existing source keys are left alone.
async fn insert_booking(pool: &PgPool, booking: &NewBooking<'_>) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO fleet_desk.bookings
        (id, client_id, vehicle_id, agent_id, start_date, end_date, status, payment_status,
         amount, commission_rate, commission_amount, pickup_location, return_location, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(booking.client_id)
    .bind(booking.vehicle_id)
    .bind(booking.agent_id)
    .bind(booking.start_date)
    .bind(booking.end_date)
    .bind(booking.status)
    .bind(booking.payment_status)
    .bind(booking.amount)
    .bind(booking.commission_rate)
    .bind(booking.commission_amount)
    .bind(booking.pickup_location)
    .bind(booking.return_location)
    .bind(booking.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Demo rows. Booking times are relative to `now` so every urgency
/// category shows up right after seeding.
pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let agents = vec![
        ("omar.benali@fleetdesk.test", "Omar", "Benali"),
        ("sara.idrissi@fleetdesk.test", "Sara", "Idrissi"),
        ("karim.tazi@fleetdesk.test", "Karim", "Tazi"),
    ];
    let clients = vec![
        ("lina.haddad@example.com", "Lina", "Haddad"),
        ("yanis.moreau@example.com", "Yanis", "Moreau"),
        ("ines.cherkaoui@example.com", "Ines", "Cherkaoui"),
    ];
    let vehicles = vec![
        ("12345-A-6", "Dacia", "Logan"),
        ("67890-B-1", "Renault", "Clio"),
        ("24680-D-3", "Peugeot", "208"),
    ];

    let mut agent_ids = HashMap::new();
    for (email, first_name, last_name) in agents {
        agent_ids.insert(email, upsert_agent(pool, email, first_name, last_name).await?);
    }
    let mut client_ids = HashMap::new();
    for (email, first_name, last_name) in clients {
        client_ids.insert(email, upsert_client(pool, email, first_name, last_name).await?);
    }
    let mut vehicle_ids = HashMap::new();
    for (plate, brand, model) in vehicles {
        vehicle_ids.insert(plate, upsert_vehicle(pool, plate, brand, model).await?);
    }

    let bookings = vec![
        (
            "seed-001",
            "omar.benali@fleetdesk.test",
            "lina.haddad@example.com",
            "12345-A-6",
            -96,
            -30,
            "completed",
            "paid",
            1200.0,
            Some(0.1),
            Some(120.0),
        ),
        (
            "seed-002",
            "sara.idrissi@fleetdesk.test",
            "yanis.moreau@example.com",
            "67890-B-1",
            -48,
            1,
            "confirmed",
            "paid",
            650.0,
            Some(0.08),
            None,
        ),
        (
            "seed-003",
            "omar.benali@fleetdesk.test",
            "ines.cherkaoui@example.com",
            "24680-D-3",
            -24,
            72,
            "confirmed",
            "pending",
            900.0,
            None,
            None,
        ),
        (
            "seed-004",
            "karim.tazi@fleetdesk.test",
            "lina.haddad@example.com",
            "67890-B-1",
            24,
            240,
            "pending",
            "pending",
            2100.0,
            Some(0.12),
            None,
        ),
    ];

    let mut inserted = 0usize;
    for (source_key, agent, client, plate, start_hours, end_hours, status, payment, amount, rate, commission) in
        bookings
    {
        let agent_id = *agent_ids.get(agent).context("seed agent missing")?;
        let client_id = *client_ids.get(client).context("seed client missing")?;
        let vehicle_id = *vehicle_ids.get(plate).context("seed vehicle missing")?;

        let written = insert_booking(
            pool,
            &NewBooking {
                source_key,
                client_id,
                vehicle_id,
                agent_id,
                start_date: now + Duration::hours(start_hours),
                end_date: now + Duration::hours(end_hours),
                status,
                payment_status: payment,
                amount,
                commission_rate: rate,
                commission_amount: commission,
                pickup_location: "Airport",
                return_location: "City centre",
            },
        )
        .await?;

        if written {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn fetch_agents(pool: &PgPool) -> anyhow::Result<Vec<Agent>> {
    let rows = sqlx::query(
        "SELECT id, first_name, last_name, email FROM fleet_desk.agents ORDER BY last_name, first_name",
    )
    .fetch_all(pool)
    .await?;

    let mut agents = Vec::new();
    for row in rows {
        agents.push(Agent {
            id: row.get::<Uuid, _>("id").to_string(),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
        });
    }

    Ok(agents)
}

pub async fn fetch_bookings(pool: &PgPool) -> anyhow::Result<Vec<Booking>> {
    let rows = sqlx::query(
        r#"
        SELECT b.id, b.client_id, b.vehicle_id, b.agent_id, b.start_date, b.end_date,
               b.status, b.payment_status, b.amount, b.commission_rate, b.commission_amount,
               b.pickup_location, b.return_location, b.created_at,
               c.first_name AS client_first_name, c.last_name AS client_last_name,
               v.brand, v.model,
               a.first_name AS agent_first_name, a.last_name AS agent_last_name
        FROM fleet_desk.bookings b
        LEFT JOIN fleet_desk.clients c ON c.id = b.client_id
        LEFT JOIN fleet_desk.vehicles v ON v.id = b.vehicle_id
        LEFT JOIN fleet_desk.agents a ON a.id = b.agent_id
        ORDER BY b.end_date
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut bookings = Vec::new();
    for row in rows {
        let id = row.get::<Uuid, _>("id").to_string();
        let status: String = row.get("status");
        let payment_status: String = row.get("payment_status");

        let (status, payment_status) = match (
            parse_booking_status(&id, Some(&status)),
            parse_payment_status(&id, Some(&payment_status)),
        ) {
            (Ok(status), Ok(payment_status)) => (status, payment_status),
            (Err(err), _) | (_, Err(err)) => {
                warn!("skipping booking row: {err}");
                continue;
            }
        };

        let client_first: Option<String> = row.get("client_first_name");
        let client_last: Option<String> = row.get("client_last_name");
        let brand: Option<String> = row.get("brand");
        let model: Option<String> = row.get("model");
        let agent_first: Option<String> = row.get("agent_first_name");
        let agent_last: Option<String> = row.get("agent_last_name");

        bookings.push(Booking {
            id,
            client_id: row.get::<Option<Uuid>, _>("client_id").map(|v| v.to_string()),
            client_name: person_name(client_first.as_deref(), client_last.as_deref()),
            vehicle_id: row.get::<Option<Uuid>, _>("vehicle_id").map(|v| v.to_string()),
            vehicle_name: vehicle_display_name(brand.as_deref(), model.as_deref()),
            agent_id: row.get::<Option<Uuid>, _>("agent_id").map(|v| v.to_string()),
            agent_name: person_name(agent_first.as_deref(), agent_last.as_deref()),
            start_date: Some(row.get("start_date")),
            end_date: Some(row.get("end_date")),
            status,
            payment_status,
            amount: row.get("amount"),
            commission_rate: row.get("commission_rate"),
            commission_amount: row.get("commission_amount"),
            pickup_location: row.get("pickup_location"),
            return_location: row.get("return_location"),
            created_at: Some(row.get("created_at")),
        });
    }

    Ok(bookings)
}

pub async fn load_dataset(pool: &PgPool) -> anyhow::Result<DataSet> {
    let agents = fetch_agents(pool).await?;
    let bookings = fetch_bookings(pool).await?;
    info!(
        "fetched {} agents and {} bookings",
        agents.len(),
        bookings.len()
    );
    Ok(DataSet { agents, bookings })
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    agent_email: String,
    agent_first_name: String,
    agent_last_name: String,
    client_email: String,
    client_first_name: String,
    client_last_name: String,
    vehicle_plate: String,
    vehicle_brand: String,
    vehicle_model: String,
    start_date: String,
    end_date: String,
    status: String,
    payment_status: String,
    amount: f64,
    commission_rate: Option<f64>,
    commission_amount: Option<f64>,
    pickup_location: Option<String>,
    return_location: Option<String>,
    source_key: Option<String>,
}

#[derive(Debug)]
struct CheckedRow {
    source_key: String,
    status: BookingStatus,
    payment_status: PaymentStatus,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

fn check_row(row: &CsvRow, reference: &DateTime<FixedOffset>) -> Result<CheckedRow, RecordError> {
    let source_key = row
        .source_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
    let status = parse_booking_status(&source_key, Some(&row.status))?;
    let payment_status = parse_payment_status(&source_key, Some(&row.payment_status))?;

    let timestamp = |field: &'static str, raw: &str| {
        parse_timestamp(raw, reference).ok_or_else(|| RecordError::InvalidValue {
            id: source_key.clone(),
            field,
            value: raw.to_string(),
        })
    };
    let start_date = timestamp("start_date", &row.start_date)?;
    let end_date = timestamp("end_date", &row.end_date)?;

    Ok(CheckedRow {
        source_key,
        status,
        payment_status,
        start_date,
        end_date,
    })
}

/// Rows that fail to parse are logged and skipped; the rest are written.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    reference: &DateTime<FixedOffset>,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!("line {line}: skipping malformed row: {err}");
                continue;
            }
        };
        let checked = match check_row(&row, reference) {
            Ok(checked) => checked,
            Err(err) => {
                warn!("line {line}: skipping row: {err}");
                continue;
            }
        };

        let agent_id =
            upsert_agent(pool, &row.agent_email, &row.agent_first_name, &row.agent_last_name)
                .await?;
        let client_id = upsert_client(
            pool,
            &row.client_email,
            &row.client_first_name,
            &row.client_last_name,
        )
        .await?;
        let vehicle_id =
            upsert_vehicle(pool, &row.vehicle_plate, &row.vehicle_brand, &row.vehicle_model)
                .await?;

        let written = insert_booking(
            pool,
            &NewBooking {
                source_key: &checked.source_key,
                client_id,
                vehicle_id,
                agent_id,
                start_date: checked.start_date,
                end_date: checked.end_date,
                status: checked.status.as_str(),
                payment_status: checked.payment_status.as_str(),
                amount: row.amount,
                commission_rate: row.commission_rate,
                commission_amount: row.commission_amount,
                pickup_location: row.pickup_location.as_deref().unwrap_or_default(),
                return_location: row.return_location.as_deref().unwrap_or_default(),
            },
        )
        .await?;

        if written {
            inserted += 1;
        }
    }

    info!("imported {inserted} bookings from {}", csv_path.display());
    Ok(inserted)
}
