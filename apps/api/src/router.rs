use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use walkin_queue_cell::handlers::WalkInQueueState;
use walkin_queue_cell::create_walkin_queue_router;

pub fn create_router(state: Arc<WalkInQueueState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .route("/health", get(|| async { "ok" }))
        .nest("/walk-in", create_walkin_queue_router(state))
}
