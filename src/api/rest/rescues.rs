use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::rescue::{Rescue, RescueStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rescues", post(dispatch_rescue).get(list_rescues))
        .route("/rescues/:id/ack", post(acknowledge_rescue))
}

#[derive(Deserialize)]
pub struct DispatchRescueRequest {
    pub rescuer_id: Uuid,
    pub rescuee_name: String,
    pub rescue_address: String,
}

#[derive(Deserialize)]
pub struct AcknowledgeRescueRequest {
    pub rescuer_id: Uuid,
}

#[derive(Deserialize)]
pub struct RescueQuery {
    pub rescuer_id: Option<Uuid>,
    pub status: Option<RescueStatus>,
}

async fn dispatch_rescue(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DispatchRescueRequest>,
) -> Result<Json<Rescue>, AppError> {
    if payload.rescuee_name.trim().is_empty() {
        return Err(AppError::BadRequest("rescuee_name cannot be empty".to_string()));
    }

    if payload.rescue_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "rescue_address cannot be empty".to_string(),
        ));
    }

    let rescue = state.store.create_rescue(
        payload.rescuer_id,
        payload.rescuee_name,
        payload.rescue_address,
    )?;

    state
        .metrics
        .rescues_total
        .with_label_values(&["dispatched"])
        .inc();
    tracing::info!(
        rescue_id = %rescue.id,
        rescuer_id = %rescue.rescuer_id,
        "rescue dispatched"
    );

    Ok(Json(rescue))
}

async fn acknowledge_rescue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcknowledgeRescueRequest>,
) -> Result<Json<Rescue>, AppError> {
    let already_acknowledged = state
        .store
        .get_rescue(id)
        .is_some_and(|rescue| rescue.status == RescueStatus::Acknowledged);

    let rescue = state.store.acknowledge_rescue(id, payload.rescuer_id)?;

    if !already_acknowledged {
        state
            .metrics
            .rescues_total
            .with_label_values(&["acknowledged"])
            .inc();
        tracing::info!(
            rescue_id = %rescue.id,
            rescuer_id = %rescue.rescuer_id,
            "rescue acknowledged"
        );
    }

    Ok(Json(rescue))
}

async fn list_rescues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RescueQuery>,
) -> Json<Vec<Rescue>> {
    Json(state.store.rescues_for(query.rescuer_id, query.status))
}
