use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use shared_config::AppConfig;
use walkin_queue_cell::handlers::WalkInQueueState;
use walkin_queue_cell::services::{
    NoopNotifier, NotificationPort, PriorityPolicy, QueueLedger, SmsGatewayNotifier,
    SupabaseDirectory, SupabaseQueueLedger, WaitTimeEstimator, WalkInQueueService,
};

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting walk-in queue API server");

    // Load configuration
    let config = AppConfig::from_env();

    // Wire the queue cell: Supabase-backed ledger and directory, SMS
    // gateway when configured
    let ledger: Arc<dyn QueueLedger> = Arc::new(SupabaseQueueLedger::new(&config));
    let directory = Arc::new(SupabaseDirectory::new(&config));
    let notifier: Arc<dyn NotificationPort> = if config.is_sms_configured() {
        Arc::new(SmsGatewayNotifier::new(&config))
    } else {
        Arc::new(NoopNotifier)
    };

    let estimator = WaitTimeEstimator::new(
        ledger.clone(),
        config.default_consultation_minutes,
        config.eta_buffer_percent,
    );
    let service = WalkInQueueService::new(
        ledger,
        directory,
        notifier,
        PriorityPolicy::default(),
        estimator,
    );
    let state = Arc::new(WalkInQueueState { service });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .await
        .unwrap();
}
