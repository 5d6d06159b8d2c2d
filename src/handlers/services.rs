use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Service;
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MIN_DURATION_MINUTES: i32 = 15;
const MAX_DURATION_MINUTES: i32 = 480;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "service name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String, AppError> {
    let description = description.trim();
    if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::Validation(format!(
            "service description must be 1-{MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(description.to_string())
}

fn validate_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(
            "price must be zero or positive".to_string(),
        ));
    }
    Ok(price)
}

fn validate_duration(duration_minutes: i32) -> Result<i32, AppError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(AppError::Validation(format!(
            "duration must be {MIN_DURATION_MINUTES}-{MAX_DURATION_MINUTES} minutes"
        )));
    }
    Ok(duration_minutes)
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Service>>, AppError> {
    let services = {
        let db = state.db.lock().unwrap();
        queries::list_active_services(&db)?
    };
    Ok(Json(services))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let service = {
        let db = state.db.lock().unwrap();
        queries::get_service_by_id(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;
    Ok(Json(service))
}

// POST /api/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration_minutes: i32,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.clock.now();
    let service = Service {
        id: Uuid::new_v4().to_string(),
        name: validate_name(&body.name)?,
        description: validate_description(&body.description)?,
        price: validate_price(body.price)?,
        duration_minutes: validate_duration(body.duration_minutes)?,
        active: true,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_service(&db, &service)?;
    }
    tracing::info!(service_id = %service.id, name = %service.name, "service created");

    Ok((StatusCode::CREATED, Json(service)))
}

// PUT /api/services/:id (partial update; absent fields keep their value)
#[derive(Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub active: Option<bool>,
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<Service>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    let mut service = queries::get_service_by_id(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;

    if let Some(name) = body.name {
        service.name = validate_name(&name)?;
    }
    if let Some(description) = body.description {
        service.description = validate_description(&description)?;
    }
    if let Some(price) = body.price {
        service.price = validate_price(price)?;
    }
    if let Some(duration_minutes) = body.duration_minutes {
        service.duration_minutes = validate_duration(duration_minutes)?;
    }
    if let Some(active) = body.active {
        service.active = active;
    }
    service.updated_at = state.clock.now();

    queries::update_service(&db, &service)?;
    Ok(Json(service))
}

// DELETE /api/services/:id (soft delete; existing bookings keep their
// reference)
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let removed = {
        let db = state.db.lock().unwrap();
        queries::deactivate_service(&db, &id, &state.clock.now())?
    };

    if removed {
        Ok(Json(serde_json::json!({"ok": true})))
    } else {
        Err(AppError::NotFound(format!("service {id}")))
    }
}
