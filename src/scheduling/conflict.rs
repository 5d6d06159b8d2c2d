use rusqlite::Connection;

use crate::db::queries;
use crate::models::Booking;

use super::Interval;

/// Returns the first non-cancelled booking for the service whose interval
/// overlaps the candidate, if any. `completed` bookings keep occupying
/// their historical slot; only cancellation frees it.
///
/// Outside the committer's critical section this answer is advisory: two
/// callers can both see "no conflict" before either inserts. The committer
/// repeats the check under the per-service lock before writing.
pub fn find_overlap(
    conn: &Connection,
    service_id: &str,
    candidate: &Interval,
) -> anyhow::Result<Option<Booking>> {
    let bookings = queries::get_active_bookings_for_service(conn, service_id)?;

    Ok(bookings.into_iter().find(|booking| {
        let occupied = Interval {
            start: booking.start_time,
            end: booking.end_time,
        };
        occupied.overlaps(candidate)
    }))
}
