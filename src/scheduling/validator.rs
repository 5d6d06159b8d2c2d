use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Customer, Service};

use super::Interval;

const MAX_NAME_LEN: usize = 100;
const MAX_NOTES_LEN: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Checks a requested interval against the service being booked. Rules run
/// in order and stop at the first failure:
/// 1. timestamps must parse (RFC 3339),
/// 2. start must precede end,
/// 3. start must not be in the past relative to `now`,
/// 4. the interval length must match the service duration; a missing end
///    time is derived from it.
pub fn validate_interval(
    now: DateTime<Utc>,
    service: &Service,
    start_time: &str,
    end_time: Option<&str>,
) -> Result<Interval, AppError> {
    let start = parse_timestamp("start_time", start_time)?;
    let end = end_time
        .map(|s| parse_timestamp("end_time", s))
        .transpose()?;

    if let Some(end) = end {
        if start >= end {
            return Err(AppError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
    }

    if start < now {
        return Err(AppError::Validation(
            "start_time must not be in the past".to_string(),
        ));
    }

    let duration = Duration::minutes(service.duration_minutes as i64);
    let end = match end {
        Some(end) => {
            if end != start + duration {
                return Err(AppError::Validation(format!(
                    "end_time must be start_time plus the service duration ({} minutes)",
                    service.duration_minutes
                )));
            }
            end
        }
        None => start + duration,
    };

    Ok(Interval { start, end })
}

pub fn validate_customer(payload: &CustomerPayload) -> Result<Customer, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "customer name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation(
            "customer email is not a valid address".to_string(),
        ));
    }

    let phone = payload.phone.trim();
    if !(9..=10).contains(&phone.len()) || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "customer phone must be 9-10 digits".to_string(),
        ));
    }

    Ok(Customer {
        name: name.to_string(),
        email,
        phone: phone.to_string(),
    })
}

pub fn validate_notes(notes: Option<&str>) -> Result<Option<String>, AppError> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(notes) => {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(AppError::Validation(format!(
                    "notes must be at most {MAX_NOTES_LEN} characters"
                )));
            }
            Ok(Some(notes.to_string()))
        }
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::Validation(format!("{field} is not a valid RFC 3339 timestamp")))
}

// Same shape the legacy validation accepted: something@something.tld,
// no whitespace.
fn is_valid_email(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.len() >= 3
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}
