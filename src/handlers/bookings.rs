use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::db::queries;
use crate::db::queries::BookingFilter;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::scheduling::{self, CustomerPayload};
use crate::state::AppState;

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub customer: CustomerPayload,
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let service = {
        let db = state.db.lock().unwrap();
        queries::get_service_by_id(&db, &body.service_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("service {}", body.service_id)))?;

    if !service.active {
        return Err(AppError::Validation(
            "service is not accepting bookings".to_string(),
        ));
    }

    let customer = scheduling::validate_customer(&body.customer)?;
    let notes = scheduling::validate_notes(body.notes.as_deref())?;
    let interval = scheduling::validate_interval(
        state.clock.now(),
        &service,
        &body.start_time,
        body.end_time.as_deref(),
    )?;

    // Advisory pre-check; the committer repeats it under the slot lock and
    // its answer is the authoritative one.
    {
        let db = state.db.lock().unwrap();
        if let Some(existing) = scheduling::find_overlap(&db, &service.id, &interval)? {
            return Err(AppError::Conflict(format!(
                "the requested time overlaps booking {}",
                existing.id
            )));
        }
    }

    let booking = scheduling::commit(
        &state.db,
        &state.slots,
        state.config.slot_lock_wait(),
        state.clock.now(),
        &service,
        interval,
        customer,
        notes,
    )
    .await?;

    tracing::info!(
        booking_id = %booking.id,
        service_id = %service.id,
        start = %booking.start_time,
        "booking created"
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub service_id: Option<String>,
    /// `YYYY-MM-DD`; restricts to bookings starting that UTC day.
    pub date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let window = query
        .date
        .as_deref()
        .map(|raw| {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::Validation("date must be YYYY-MM-DD".to_string()))?;
            let from = date.and_time(NaiveTime::MIN).and_utc();
            Ok::<_, AppError>((from, from + chrono::Duration::days(1)))
        })
        .transpose()?;

    let status = query
        .status
        .as_deref()
        .map(|raw| {
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown status '{raw}'")))
        })
        .transpose()?;

    let filter = BookingFilter {
        service_id: query.service_id.as_deref(),
        window,
        status,
        limit: query.limit.unwrap_or(100),
    };

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, &filter)?
    };
    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_id(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    Ok(Json(booking))
}

// PATCH /api/bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let requested = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", body.status)))?;

    let db = state.db.lock().unwrap();
    let booking = scheduling::transition(&db, state.clock.now(), &id, requested)?;
    Ok(Json(booking))
}

// DELETE /api/bookings/:id (cancel; the record is kept for history)
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db.lock().unwrap();
    let booking = scheduling::transition(&db, state.clock.now(), &id, BookingStatus::Cancelled)?;
    Ok(Json(booking))
}
