use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};

/// Moves a booking to the requested status. Re-applying the current status
/// is accepted as a no-op, so cancellation is idempotent. `cancelled` and
/// `completed` admit no further changes. No conflict re-check happens
/// here: cancelling never creates an overlap, and confirming a pending
/// booking keeps the interval it already holds.
pub fn transition(
    conn: &Connection,
    now: DateTime<Utc>,
    booking_id: &str,
    requested: BookingStatus,
) -> Result<Booking, AppError> {
    let mut booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.status == requested {
        return Ok(booking);
    }

    if !transition_allowed(booking.status, requested) {
        return Err(AppError::InvalidTransition {
            from: booking.status.as_str(),
            to: requested.as_str(),
        });
    }

    queries::update_booking_status(conn, booking_id, requested, &now)?;
    tracing::info!(
        booking_id = %booking.id,
        from = booking.status.as_str(),
        to = requested.as_str(),
        "booking status changed"
    );

    booking.status = requested;
    booking.updated_at = now;
    Ok(booking)
}

fn transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Pending, Completed)
            | (Confirmed, Cancelled)
            | (Confirmed, Completed)
    )
}
