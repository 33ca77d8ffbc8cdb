use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    call_next, cancel_entry, check_in, get_live_queue, get_public_display, get_queue_stats,
    update_priority, update_triage, WalkInQueueState,
};

pub fn create_walkin_queue_router(state: Arc<WalkInQueueState>) -> Router {
    Router::new()
        .route("/check-in", post(check_in))
        .route("/queue/{doctor_id}", get(get_live_queue))
        .route("/call-next/{doctor_id}", post(call_next))
        .route("/entry/{entry_id}/cancel", post(cancel_entry))
        .route("/entry/{entry_id}/priority", post(update_priority))
        .route("/entry/{entry_id}/triage", post(update_triage))
        .route("/display/{doctor_id}", get(get_public_display))
        .route("/stats/{doctor_id}", get(get_queue_stats))
        .with_state(state)
}
