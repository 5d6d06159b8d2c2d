use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Customer, Service};

use super::{conflict, Interval};

/// One async mutex per service id, created lazily. Writers for the same
/// service serialize through it; writers for different services never
/// contend. Waiting is bounded so a stuck writer degrades into retryable
/// `Busy` errors instead of piling up requests.
pub struct SlotLocks {
    inner: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(HashMap::new()),
        }
    }

    fn for_service(&self, service_id: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.inner.lock().unwrap();
        table
            .entry(service_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn acquire(
        &self,
        service_id: &str,
        wait: Duration,
    ) -> Result<OwnedMutexGuard<()>, AppError> {
        let lock = self.for_service(service_id);
        tokio::time::timeout(wait, lock.lock_owned())
            .await
            .map_err(|_| AppError::Busy)
    }
}

impl Default for SlotLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative check-and-insert. The conflict check and the insert
/// run inside the service's critical section, so of any set of racing
/// writers with overlapping intervals exactly one commits; the rest get
/// `Conflict`. A booking is either fully inserted as `pending` or not at
/// all.
pub async fn commit(
    db: &Arc<StdMutex<Connection>>,
    locks: &SlotLocks,
    lock_wait: Duration,
    now: DateTime<Utc>,
    service: &Service,
    interval: Interval,
    customer: Customer,
    notes: Option<String>,
) -> Result<Booking, AppError> {
    let _guard = locks.acquire(&service.id, lock_wait).await?;

    // The db mutex is only taken inside the critical section and never
    // held across an await.
    let conn = db.lock().unwrap();

    if let Some(existing) = conflict::find_overlap(&conn, &service.id, &interval)? {
        return Err(AppError::Conflict(format!(
            "the requested time overlaps booking {}",
            existing.id
        )));
    }

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        service_id: service.id.clone(),
        customer,
        start_time: interval.start,
        end_time: interval.end,
        status: BookingStatus::Pending,
        notes,
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(&conn, &booking)?;

    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .unwrap()
            .and_utc()
    }

    fn iv(start: &str, end: &str) -> Interval {
        Interval {
            start: dt(start),
            end: dt(end),
        }
    }

    fn test_service(id: &str) -> Service {
        Service {
            id: id.to_string(),
            name: "Haircut".to_string(),
            description: "A standard haircut".to_string(),
            price: 25.0,
            duration_minutes: 30,
            active: true,
            created_at: dt("2025-01-01 00:00"),
            updated_at: dt("2025-01-01 00:00"),
        }
    }

    fn test_customer() -> Customer {
        Customer {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: "0812345678".to_string(),
        }
    }

    fn setup_db(services: &[&Service]) -> Arc<StdMutex<Connection>> {
        let conn = db::init_db(":memory:").unwrap();
        for service in services {
            queries::create_service(&conn, service).unwrap();
        }
        Arc::new(StdMutex::new(conn))
    }

    const WAIT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn test_commit_creates_pending_booking() {
        let service = test_service("svc-1");
        let db = setup_db(&[&service]);
        let locks = SlotLocks::new();

        let booking = commit(
            &db,
            &locks,
            WAIT,
            dt("2025-06-01 00:00"),
            &service,
            iv("2025-06-16 09:00", "2025-06-16 09:30"),
            test_customer(),
            Some("first visit".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.service_id, "svc-1");

        let conn = db.lock().unwrap();
        let stored = queries::get_booking_by_id(&conn, &booking.id)
            .unwrap()
            .expect("booking persisted");
        assert_eq!(stored.start_time, booking.start_time);
        assert_eq!(stored.notes.as_deref(), Some("first visit"));
    }

    #[tokio::test]
    async fn test_commit_rejects_overlap() {
        let service = test_service("svc-1");
        let db = setup_db(&[&service]);
        let locks = SlotLocks::new();
        let now = dt("2025-06-01 00:00");

        commit(
            &db,
            &locks,
            WAIT,
            now,
            &service,
            iv("2025-06-16 09:00", "2025-06-16 09:30"),
            test_customer(),
            None,
        )
        .await
        .unwrap();

        let err = commit(
            &db,
            &locks,
            WAIT,
            now,
            &service,
            iv("2025-06-16 09:15", "2025-06-16 09:45"),
            test_customer(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_racing_writers_have_one_winner() {
        let service = Arc::new(test_service("svc-1"));
        let db = setup_db(&[service.as_ref()]);
        let locks = Arc::new(SlotLocks::new());
        let now = dt("2025-06-01 00:00");

        let mut handles = vec![];
        for _ in 0..4 {
            let db = Arc::clone(&db);
            let locks = Arc::clone(&locks);
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                commit(
                    &db,
                    &locks,
                    WAIT,
                    now,
                    &service,
                    iv("2025-06-16 09:00", "2025-06-16 09:30"),
                    test_customer(),
                    None,
                )
                .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 3);
    }

    #[tokio::test]
    async fn test_different_services_do_not_contend() {
        let svc_a = test_service("svc-a");
        let svc_b = test_service("svc-b");
        let db = setup_db(&[&svc_a, &svc_b]);
        let locks = SlotLocks::new();
        let now = dt("2025-06-01 00:00");
        let span = iv("2025-06-16 09:00", "2025-06-16 09:30");

        // Hold svc-a's lock; svc-b commits must still go through.
        let _held = locks.acquire("svc-a", WAIT).await.unwrap();

        let booking = commit(&db, &locks, WAIT, now, &svc_b, span, test_customer(), None)
            .await
            .unwrap();
        assert_eq!(booking.service_id, "svc-b");
    }

    #[tokio::test]
    async fn test_held_lock_times_out_as_busy() {
        let service = test_service("svc-1");
        let db = setup_db(&[&service]);
        let locks = SlotLocks::new();

        let _held = locks.acquire("svc-1", WAIT).await.unwrap();

        let err = commit(
            &db,
            &locks,
            Duration::from_millis(50),
            dt("2025-06-01 00:00"),
            &service,
            iv("2025-06-16 09:00", "2025-06-16 09:30"),
            test_customer(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Busy));
    }
}
