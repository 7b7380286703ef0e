//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::delivery::DeliveryClient;
use crate::generator::LlmCodeGenerator;
use crate::llm::OpenRouterClient;
use crate::publish::{GitHubClient, GitHubPublisher};
use crate::task::{TaskCoordinator, TaskRecord, TaskRegistry};

use super::error::ApiError;
use super::types::{DeployResponse, HealthResponse, ServiceInfo};

/// Shared application state.
pub struct AppState {
    pub coordinator: Arc<TaskCoordinator>,
}

impl AppState {
    /// Wire the production adapters from configuration.
    pub fn from_config(config: &Config) -> Self {
        let llm = Arc::new(OpenRouterClient::new(
            config.llm.api_key.clone(),
            config.llm.api_url.clone(),
            config.llm.timeout,
        ));
        let generator = Arc::new(LlmCodeGenerator::new(llm, config.llm.model.clone()));
        let publisher = Arc::new(GitHubPublisher::new(
            GitHubClient::new(config.github.api_url.clone(), config.github.token.clone()),
            config.github.username.clone(),
            config.github.settle_delay,
        ));

        let coordinator = TaskCoordinator::new(
            config.secret.clone(),
            Arc::new(TaskRegistry::new()),
            generator,
            publisher,
            Arc::new(DeliveryClient::new()),
            config.delivery.clone(),
        );

        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/api/deploy", post(deploy))
        .route("/api/task/:task_id", get(get_task))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config));
    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, draining task pipelines...");
    state.coordinator.shutdown().await;
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Service metadata.
async fn service_info(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        description: env!("CARGO_PKG_DESCRIPTION"),
        endpoints: vec![
            "POST /api/deploy",
            "GET /api/task/:task_id",
            "GET /health",
        ],
        tasks: state.coordinator.registry().counts().await,
    })
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Submit a task. Returns immediately; the pipeline runs in the background.
async fn deploy(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DeployResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let outcome = state.coordinator.submit(body).await?;
    Ok(Json(outcome.into()))
}

/// Get the recorded state of a task.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    state
        .coordinator
        .registry()
        .snapshot(&task_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", task_id)))
}
