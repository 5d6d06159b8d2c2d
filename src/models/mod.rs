pub mod booking;
pub mod service;

pub use booking::{Booking, BookingStatus, Customer};
pub use service::Service;
