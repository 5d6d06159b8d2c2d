pub mod committer;
pub mod conflict;
pub mod lifecycle;
pub mod validator;

pub use committer::{commit, SlotLocks};
pub use conflict::find_overlap;
pub use lifecycle::transition;
pub use validator::{validate_customer, validate_interval, validate_notes, CustomerPayload};

use chrono::{DateTime, Utc};

/// A half-open time range `[start, end)` during which a service is
/// occupied. A booking ending at 10:00 does not collide with one starting
/// at 10:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}
