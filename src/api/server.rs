//! Router assembly and server lifecycle.

use super::{AppState, rooms, tasks};
use axum::{
    Router,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        // Task routes
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/suggestions", get(tasks::get_suggestions))
        .route("/api/tasks/stats", get(tasks::get_stats))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/api/tasks/{id}/status",
            axum::routing::patch(tasks::update_task_status),
        )
        // Dependency routes
        .route(
            "/api/tasks/{id}/available-dependencies",
            get(tasks::get_available_dependencies),
        )
        .route("/api/tasks/{id}/dependencies", post(tasks::add_dependency))
        .route(
            "/api/tasks/{id}/dependencies/{dep_id}",
            axum::routing::delete(tasks::remove_dependency),
        )
        .route(
            "/api/tasks/{id}/dependency-graph",
            get(tasks::get_dependency_graph),
        )
        .route("/api/tasks/{id}/blockers", get(tasks::get_blockers))
        // Room routes
        .route("/api/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/api/rooms/{id}",
            get(rooms::get_room)
                .put(rooms::update_room)
                .delete(rooms::delete_room),
        )
        .route("/api/rooms/{id}/stats", get(rooms::get_room_stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running server.
pub struct ServerHandle {
    /// Address the server is bound to.
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Signal shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Server task ended abnormally: {}", e);
        }
    }
}

/// Bind `addr` and serve the API in a background task.
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx,
        task,
    })
}
