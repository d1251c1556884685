//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::scheduler::Scheduler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub scheduler: Arc<Scheduler>,
}

/// Web server for Uptrail.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, scheduler: Arc<Scheduler>) -> Self {
        Self {
            state: AppState { config, scheduler },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            // API endpoints
            .route("/api/status", get(handlers::handle_status))
            .route(
                "/api/check-now",
                get(handlers::handle_check_now).post(handlers::handle_check_now),
            )
            .route("/api/check-url/{index}", post(handlers::handle_check_url))
            .route("/api/history", get(handlers::handle_history))
            .route("/api/control", post(handlers::handle_control))
            .route("/api/debug", get(handlers::handle_debug))
            .route("/health", get(handlers::handle_health))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
