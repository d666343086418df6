//! API Server Module
//!
//! This module contains the router and server setup for the API system.

use anyhow::{Context, Result};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use modelgate_core::{ModelService, ServerSettings};

use crate::auth::{require_bearer, AuthGate};
use crate::handlers::{
    health_check, login, predict, retrain_model, retrain_status, update_model, whoami, ApiState,
};

/// Build the application router with authentication applied to every route
pub fn create_router(state: Arc<ApiState>, gate: AuthGate) -> Router {
    Router::new()
        // Model operations
        .route("/update-model", post(update_model))
        .route("/update-model/:task_id", get(retrain_status))
        .route("/model/re-train", post(retrain_model))
        .route("/predict", post(predict))
        // Identity
        .route("/whoami", get(whoami))
        .route("/login", post(login))
        // Health check
        .route("/public/health", get(health_check))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(gate, require_bearer))
        .layer(TraceLayer::new_for_http())
}

/// Main API server
pub struct ApiServer {
    /// Listener configuration
    settings: ServerSettings,
    /// Shared state
    state: Arc<ApiState>,
    gate: AuthGate,
    /// How long to wait for background retrains on shutdown
    shutdown_timeout: Duration,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        settings: ServerSettings,
        service: ModelService,
        gate: AuthGate,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            state: Arc::new(ApiState::new(service)),
            gate,
            shutdown_timeout,
        }
    }

    /// Start the API server and run until Ctrl-C or SIGTERM
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting ModelGate API server on {}:{}",
            self.settings.host, self.settings.port
        );

        let app = create_router(self.state.clone(), self.gate.clone());

        let listener =
            tokio::net::TcpListener::bind((self.settings.host.as_str(), self.settings.port))
                .await
                .with_context(|| {
                    format!(
                        "Failed to bind {}:{}",
                        self.settings.host, self.settings.port
                    )
                })?;
        info!("ModelGate API server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

        info!("HTTP server closed");
        self.state.service.shutdown(self.shutdown_timeout).await;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
