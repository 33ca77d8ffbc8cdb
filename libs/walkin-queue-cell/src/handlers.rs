use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::error::WalkInQueueError;
use crate::models::{
    CallNextRequest, CancelEntryRequest, CheckInRequest, UpdatePriorityRequest,
    UpdateTriageRequest,
};
use crate::services::controller::WalkInQueueService;

pub struct WalkInQueueState {
    pub service: WalkInQueueService,
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Uuid,
}

fn map_queue_error(e: WalkInQueueError) -> AppError {
    error!("Queue operation failed: {}", e);
    match e {
        WalkInQueueError::PatientNotFound(_)
        | WalkInQueueError::DoctorNotFound(_)
        | WalkInQueueError::EntryNotFound(_) => AppError::NotFound(e.to_string()),
        WalkInQueueError::AlreadyInQueue { .. }
        | WalkInQueueError::Conflict { .. }
        | WalkInQueueError::StaleStatus { .. }
        | WalkInQueueError::InvalidStatusTransition { .. } => AppError::Conflict(e.to_string()),
        WalkInQueueError::InvalidTriageLevel(_) => AppError::BadRequest(e.to_string()),
        WalkInQueueError::Ledger(_) => AppError::Database(e.to_string()),
        WalkInQueueError::Serialization(_) => AppError::Internal(e.to_string()),
    }
}

/// Register a walk-in patient with a doctor's queue
pub async fn check_in(
    State(state): State<Arc<WalkInQueueState>>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Value>, AppError> {
    let response = state
        .service
        .add_to_queue(request)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "success": true,
        "entry_id": response.entry_id,
        "visit_id": response.visit_id,
        "queue_number": response.queue_number,
        "queue_position": response.queue_position,
        "estimated_wait_minutes": response.estimated_wait_minutes,
        "notification_sent": response.notification_sent
    })))
}

/// Live queue for a doctor: current patient plus the ordered waiting list
pub async fn get_live_queue(
    State(state): State<Arc<WalkInQueueState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, AppError> {
    let view = state
        .service
        .get_live_queue(query.tenant_id, doctor_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(serde_json::to_value(view).map_err(|e| AppError::Internal(e.to_string()))?))
}

/// Complete the current consultation and call the next waiting patient
pub async fn call_next(
    State(state): State<Arc<WalkInQueueState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CallNextRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .service
        .call_next_patient(request.tenant_id, doctor_id, request.room_number)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "called": outcome.called,
        "completed_entry_id": outcome.completed_entry_id,
        "turn_now_sent": outcome.turn_now_sent,
        "turn_soon_notified": outcome.turn_soon_notified
    })))
}

/// Cancel a waiting entry
pub async fn cancel_entry(
    State(state): State<Arc<WalkInQueueState>>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<CancelEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .remove_from_queue(entry_id, request.reason)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "success": true,
        "entry_id": entry.id,
        "status": entry.status
    })))
}

/// Override the administrative priority category of an entry
pub async fn update_priority(
    State(state): State<Arc<WalkInQueueState>>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<UpdatePriorityRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .update_priority(entry_id, request.priority_category)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "success": true,
        "entry_id": entry.id,
        "priority_category": entry.priority_category,
        "priority_score": entry.priority_score
    })))
}

/// Record the nursing triage level and reprioritize the waiting queue
pub async fn update_triage(
    State(state): State<Arc<WalkInQueueState>>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<UpdateTriageRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .update_triage_level(entry_id, request.triage_level)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "success": true,
        "entry_id": entry.id,
        "triage_level": entry.triage_level,
        "queue_position": entry.queue_position,
        "estimated_wait_minutes": entry.estimated_wait_minutes
    })))
}

/// Anonymized waiting-room display board
pub async fn get_public_display(
    State(state): State<Arc<WalkInQueueState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, AppError> {
    let view = state
        .service
        .get_public_display(query.tenant_id, doctor_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(serde_json::to_value(view).map_err(|e| AppError::Internal(e.to_string()))?))
}

/// Day-level queue statistics for a doctor
pub async fn get_queue_stats(
    State(state): State<Arc<WalkInQueueState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Value>, AppError> {
    let stats = state
        .service
        .queue_stats(query.tenant_id, doctor_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "doctor_id": stats.doctor_id,
        "waiting_count": stats.waiting_count,
        "completed_today": stats.completed_today,
        "average_wait_minutes_today": stats.average_wait_minutes_today,
        "average_consultation_minutes": stats.average_consultation_minutes
    })))
}
