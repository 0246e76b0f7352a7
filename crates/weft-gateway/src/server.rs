use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use weft_actions::ActionRegistry;
use weft_core::config::GatewayConfig;
use weft_core::event::EventBus;
use weft_models::ModelRegistry;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        models: Arc<ModelRegistry>,
        actions: Arc<ActionRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                models,
                actions,
                events,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/models", get(routes::list_models))
            .route("/api/workflows/run", post(routes::run_workflow))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
