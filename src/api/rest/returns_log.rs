use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::returns::ReturnLog;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/returns", post(log_return))
        .route("/drivers/:id/returns", get(list_returns))
}

#[derive(Deserialize)]
pub struct LogReturnRequest {
    pub driver_id: Uuid,
    pub dsp_name: String,
    pub return_count: u32,
    pub reasons: Vec<String>,
}

/// Append one completed-route summary. Fire-and-forget from the driver
/// client's perspective: a failure comes straight back to the caller for a
/// manual retry, there is no retry or backoff here.
async fn log_return(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LogReturnRequest>,
) -> Result<Json<ReturnLog>, AppError> {
    let log = state.store.append_return(
        payload.driver_id,
        payload.dsp_name,
        payload.return_count,
        payload.reasons,
    )?;

    state.metrics.returns_logged_total.inc();
    tracing::info!(
        driver_id = %log.driver_id,
        return_count = log.return_count,
        "route completion logged"
    );

    Ok(Json(log))
}

async fn list_returns(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<ReturnLog>> {
    Json(state.store.returns_for(id))
}
