use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Customer, Service};

/// Timestamps are stored as second-precision RFC 3339 UTC strings, so the
/// lexicographic comparisons SQLite does on them match time order.
pub fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("invalid stored timestamp {s:?}: {e}"))?;
    Ok(dt.with_timezone(&Utc))
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, service_id, customer_name, customer_email, customer_phone, \
     start_time, end_time, status, notes, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, service_id, customer_name, customer_email, customer_phone, start_time, end_time, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.service_id,
            booking.customer.name,
            booking.customer.email,
            booking.customer.phone,
            fmt_ts(&booking.start_time),
            fmt_ts(&booking.end_time),
            booking.status.as_str(),
            booking.notes,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All bookings for a service that still occupy their slot, i.e. every
/// status except `cancelled`.
pub fn get_active_bookings_for_service(
    conn: &Connection,
    service_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE service_id = ?1 AND status != 'cancelled'
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![service_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(updated_at), id],
    )?;
    Ok(count > 0)
}

#[derive(Debug, Default)]
pub struct BookingFilter<'a> {
    pub service_id: Option<&'a str>,
    /// Half-open window on start_time, `[from, to)`.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub status: Option<BookingStatus>,
    pub limit: i64,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(service_id) = filter.service_id {
        params_vec.push(Box::new(service_id.to_string()));
        clauses.push(format!("service_id = ?{}", params_vec.len()));
    }
    if let Some((from, to)) = &filter.window {
        params_vec.push(Box::new(fmt_ts(from)));
        clauses.push(format!("start_time >= ?{}", params_vec.len()));
        params_vec.push(Box::new(fmt_ts(to)));
        clauses.push(format!("start_time < ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", params_vec.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    params_vec.push(Box::new(filter.limit));
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql} ORDER BY start_time ASC LIMIT ?{}",
        params_vec.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let service_id: String = row.get(1)?;
    let customer_name: String = row.get(2)?;
    let customer_email: String = row.get(3)?;
    let customer_phone: String = row.get(4)?;
    let start_time_str: String = row.get(5)?;
    let end_time_str: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let notes: Option<String> = row.get(8)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status in store: {status_str:?}"))?;

    Ok(Booking {
        id,
        service_id,
        customer: Customer {
            name: customer_name,
            email: customer_email,
            phone: customer_phone,
        },
        start_time: parse_ts(&start_time_str)?,
        end_time: parse_ts(&end_time_str)?,
        status,
        notes,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Services ──

const SERVICE_COLUMNS: &str =
    "id, name, description, price, duration_minutes, active, created_at, updated_at";

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, description, price, duration_minutes, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            service.id,
            service.name,
            service.description,
            service.price,
            service.duration_minutes,
            service.active as i32,
            fmt_ts(&service.created_at),
            fmt_ts(&service.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_service_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_active_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE active = 1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE services SET name = ?1, description = ?2, price = ?3, duration_minutes = ?4, active = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            service.name,
            service.description,
            service.price,
            service.duration_minutes,
            service.active as i32,
            fmt_ts(&service.updated_at),
            service.id,
        ],
    )?;
    Ok(())
}

pub fn deactivate_service(
    conn: &Connection,
    id: &str,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET active = 0, updated_at = ?1 WHERE id = ?2",
        params![fmt_ts(updated_at), id],
    )?;
    Ok(count > 0)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let description: String = row.get(2)?;
    let price: f64 = row.get(3)?;
    let duration_minutes: i32 = row.get(4)?;
    let active: bool = row.get::<_, i32>(5)? != 0;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    Ok(Service {
        id,
        name,
        description,
        price,
        duration_minutes,
        active,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}
