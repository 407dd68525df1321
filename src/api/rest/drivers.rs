use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::controller::run_duty_controller;
use crate::engine::duty;
use crate::error::AppError;
use crate::models::driver::DriverRecord;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/activation", patch(set_activation))
        .route("/drivers/on-duty", post(bulk_set_on_duty))
        .route("/drivers/:id/on-duty", post(set_on_duty))
        .route("/drivers/:id/off-duty", post(set_off_duty))
        .route("/drivers/:id/route-complete", post(mark_route_complete))
        .route("/drivers/:id/check-in", post(set_checked_in))
        .route("/drivers/:id/rts-ack", post(acknowledge_rts))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub dsp_name: String,
}

#[derive(Deserialize)]
pub struct SetActivationRequest {
    pub activated: bool,
}

#[derive(Deserialize)]
pub struct BulkOnDutyRequest {
    pub driver_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct BulkOnDutyResponse {
    pub updated: Vec<DriverRecord>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Serialize)]
pub struct BulkFailure {
    pub driver_id: Uuid,
    pub error: String,
}

#[derive(Deserialize)]
pub struct CheckInRequest {
    pub checked_in: bool,
    /// The driver client shows an interstitial confirmation before the write;
    /// an unconfirmed toggle is rejected outright.
    pub confirmed: bool,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<DriverRecord>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.dsp_name.trim().is_empty() {
        return Err(AppError::BadRequest("dsp_name cannot be empty".to_string()));
    }

    let driver = state.store.create_driver(payload.name, payload.dsp_name);
    tokio::spawn(run_duty_controller(state.clone(), driver.id));

    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<DriverRecord>> {
    Json(state.store.list_drivers())
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverRecord>, AppError> {
    let driver = state
        .store
        .get_driver(id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    Ok(Json(driver))
}

async fn set_activation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActivationRequest>,
) -> Result<Json<DriverRecord>, AppError> {
    let (driver, _) = state.store.write_driver(id, |rec| {
        let changed = rec.activated != payload.activated;
        rec.activated = payload.activated;
        Ok(changed)
    })?;

    Ok(Json(driver))
}

async fn set_on_duty(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverRecord>, AppError> {
    let now = Utc::now();
    let (driver, _) = state.store.write_driver(id, |rec| duty::set_on_duty(rec, now))?;

    state
        .metrics
        .duty_transitions_total
        .with_label_values(&["on_duty"])
        .inc();
    state
        .metrics
        .drivers_on_duty
        .set(state.store.on_duty_count() as i64);
    tracing::info!(driver_id = %id, "driver marked on duty");

    Ok(Json(driver))
}

/// Bulk assignment shares a single `now` across the batch, so every driver in
/// it carries the same `on_duty_since` and the batch expires together.
async fn bulk_set_on_duty(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkOnDutyRequest>,
) -> Result<Json<BulkOnDutyResponse>, AppError> {
    if payload.driver_ids.is_empty() {
        return Err(AppError::BadRequest("driver_ids cannot be empty".to_string()));
    }

    let now = Utc::now();
    let mut updated = Vec::new();
    let mut failed = Vec::new();

    for driver_id in payload.driver_ids {
        match state
            .store
            .write_driver(driver_id, |rec| duty::set_on_duty(rec, now))
        {
            Ok((driver, _)) => {
                state
                    .metrics
                    .duty_transitions_total
                    .with_label_values(&["on_duty"])
                    .inc();
                updated.push(driver);
            }
            Err(err) => failed.push(BulkFailure {
                driver_id,
                error: err.to_string(),
            }),
        }
    }

    state
        .metrics
        .drivers_on_duty
        .set(state.store.on_duty_count() as i64);
    tracing::info!(
        updated = updated.len(),
        failed = failed.len(),
        "bulk on-duty assignment applied"
    );

    Ok(Json(BulkOnDutyResponse { updated, failed }))
}

async fn set_off_duty(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverRecord>, AppError> {
    let (driver, changed) = state
        .store
        .write_driver(id, |rec| Ok(duty::set_off_duty(rec)))?;

    if changed {
        state
            .metrics
            .duty_transitions_total
            .with_label_values(&["off_duty"])
            .inc();
        state
            .metrics
            .drivers_on_duty
            .set(state.store.on_duty_count() as i64);
        tracing::info!(driver_id = %id, "driver marked off duty");
    }

    Ok(Json(driver))
}

async fn mark_route_complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverRecord>, AppError> {
    let (driver, changed) = state.store.write_driver(id, duty::mark_route_complete)?;

    if changed {
        state
            .metrics
            .duty_transitions_total
            .with_label_values(&["route_complete"])
            .inc();
        tracing::info!(driver_id = %id, "route marked complete; awaiting RTS acknowledgement");
    }

    Ok(Json(driver))
}

async fn set_checked_in(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CheckInRequest>,
) -> Result<Json<DriverRecord>, AppError> {
    if !payload.confirmed {
        return Err(AppError::BadRequest(
            "check-in change must be confirmed".to_string(),
        ));
    }

    let (driver, changed) = state
        .store
        .write_driver(id, |rec| duty::set_checked_in(rec, payload.checked_in))?;

    if changed {
        let transition = if payload.checked_in { "check_in" } else { "check_out" };
        state
            .metrics
            .duty_transitions_total
            .with_label_values(&[transition])
            .inc();
        tracing::info!(driver_id = %id, checked_in = payload.checked_in, "check-in state changed");
    }

    Ok(Json(driver))
}

async fn acknowledge_rts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverRecord>, AppError> {
    let (driver, _) = state.store.write_driver(id, duty::acknowledge_rts)?;

    state
        .metrics
        .duty_transitions_total
        .with_label_values(&["rts_acknowledged"])
        .inc();
    state
        .metrics
        .drivers_on_duty
        .set(state.store.on_duty_count() as i64);
    tracing::info!(driver_id = %id, "return-to-station acknowledged; driver off duty");

    Ok(Json(driver))
}
