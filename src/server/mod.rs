//! HTTP gateway.
//!
//! This module provides:
//! - Shared application state
//! - The axum router with every gateway route
//! - The server entry point with the demo notification ticker

mod handlers;

pub use handlers::{
    ClientSettings, MarkReadResponse, QueryRequest, QueryResponse, SuggestionsResponse,
    SummaryResponse,
};

use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis::AnalysisPipeline;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::impact::DataSources;
use crate::llm::LlmClient;
use crate::notifications::{spawn_demo_ticker, NotificationHub, NotificationStore};

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Hosted model client.
    pub llm: LlmClient,
    /// Mock notification list.
    pub notifications: NotificationStore,
    /// Live notification fan-out.
    pub hub: Arc<NotificationHub>,
    /// Analysis and forecast runs.
    pub pipeline: AnalysisPipeline,
    /// Cancelled when the gateway shuts down; ends every open SSE stream.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, llm: LlmClient, sources: Arc<dyn DataSources>) -> Self {
        info!(
            model = %llm.model(),
            llm_configured = llm.is_configured(),
            "AppState initializing"
        );

        let hub = Arc::new(NotificationHub::new(config.notifications.capacity));
        let pipeline = AnalysisPipeline::new(sources, llm.clone());

        Self {
            config,
            llm,
            notifications: NotificationStore::seeded(),
            hub,
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

/// Build the gateway router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/config", get(handlers::client_settings))
        .route("/api/ai/query", post(handlers::ai_query))
        .route("/api/ai/team-summary/:team_id", get(handlers::team_summary))
        .route("/api/ai/suggestions/:team_id", get(handlers::team_suggestions))
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/read-all",
            patch(handlers::mark_all_notifications_read),
        )
        .route(
            "/api/notifications/:id/read",
            patch(handlers::mark_notification_read),
        )
        .route("/api/teams", get(handlers::list_teams))
        .route("/api/teams/:team_id", get(handlers::get_team))
        .route("/api/teams/:team_id/activity", get(handlers::team_activity))
        .route("/api/sse/notifications", get(handlers::notification_stream))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/analyze/stream", post(handlers::analyze_stream))
        .route("/api/forecast/stream", post(handlers::forecast_stream))
        .route("/api/datacenter-types", get(handlers::datacenter_types))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// The gateway HTTP server
pub struct GatewayServer {
    state: SharedState,
    demo_notifications: bool,
}

impl GatewayServer {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            demo_notifications: true,
        }
    }

    /// Turn the random demo notifications on or off
    pub fn with_demo_notifications(mut self, enabled: bool) -> Self {
        self.demo_notifications = enabled;
        self
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> AppResult<()> {
        let addr = self.state.config.listen_addr();
        info!(addr = %addr, "Starting gateway");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Failed to bind {}: {}", addr, e),
            })?;
        self.run(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C or until
    /// `AppState::shutdown` is cancelled
    pub async fn run(self, listener: TcpListener) -> AppResult<()> {
        if let Ok(local) = listener.local_addr() {
            info!(url = %format!("http://{}", local), "Gateway ready");
        }

        let ticker = self.demo_notifications.then(|| {
            spawn_demo_ticker(
                self.state.hub.clone(),
                self.state.config.notifications.clone(),
            )
        });

        let shutdown = self.state.shutdown.clone();
        let result = axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("Server error: {}", e),
            });

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        info!("Gateway stopped");
        result
    }
}

/// Resolves on Ctrl-C or external cancellation, cancelling the token either
/// way so open streams close and the server can drain
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for shutdown signal");
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
