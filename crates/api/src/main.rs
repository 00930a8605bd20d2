use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_api::config::{ExecutorConfig, ServerConfig};
use studio_api::executor::{BackendClient, ExecutorService};
use studio_api::router::build_app_router;
use studio_api::server::serve_with_drain;
use studio_api::state::AppState;
use studio_api::workflows::WorkflowOrchestrator;
use studio_db::PgStore;
use studio_engine::{CloudWorkflowsClient, EngineConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_api=debug,studio_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = studio_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    studio_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    studio_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Workflow engine ---
    let engine_config = EngineConfig::from_env();
    let executor_url = engine_config.executor_url.clone();
    let engine = Arc::new(CloudWorkflowsClient::new(engine_config));
    tracing::info!(%executor_url, "Workflow engine client created");

    // --- Executor façade ---
    let executor_config = ExecutorConfig::from_env();
    tracing::info!(backend_url = %executor_config.backend_url, "Loaded executor configuration");
    let backend = BackendClient::new(executor_config).expect("Failed to build backend HTTP client");

    // --- App state ---
    let store = Arc::new(PgStore::new(pool));
    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        workflows: Arc::new(WorkflowOrchestrator::new(store, engine, executor_url)),
        executor: Arc::new(ExecutorService::new(backend)),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    serve_with_drain(
        listener,
        app,
        shutdown_signal(),
        Duration::from_secs(config.shutdown_timeout_secs),
    )
    .await
    .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
