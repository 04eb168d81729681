//! # Evolv Gateway
//!
//! API gateway and terminal client for the data center impact analyzer and
//! the OrgAI team dashboard.
//!
//! ## Features
//!
//! - **LLM proxy**: team questions, summaries, and suggestions answered by a
//!   hosted OpenAI-compatible model
//! - **Streamed analysis**: impact analyses and growth forecasts delivered as
//!   Server-Sent Events, with model text streamed chunk by chunk
//! - **Notification push**: one broadcast channel fanned out to every open
//!   SSE connection
//! - **Terminal client**: a stream session/dispatch core that accumulates
//!   analysis text and renders progress, with persisted selection state
//!
//! ## Architecture
//!
//! ```text
//! evolv (client) ──HTTP/SSE──▶ gateway (axum) ──HTTP──▶ hosted model
//!       │                            │
//!   SQLite (state)             mock teams / notifications
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use evolv_gateway::{Config, AppState, GatewayServer};
//! use evolv_gateway::impact::FallbackDataSources;
//! use evolv_gateway::llm::LlmClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let llm = LlmClient::new(&config.llm, config.request.clone())?;
//!     let state = Arc::new(AppState::new(config, llm, Arc::new(FallbackDataSources)));
//!     GatewayServer::new(state).serve().await?;
//!     Ok(())
//! }
//! ```

/// Streaming analysis and forecast pipelines.
pub mod analysis;
/// Command line interface.
pub mod cli;
/// Terminal client: API calls, controller, renderer.
pub mod client;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Cosmetic forecast and map overlay model.
pub mod forecast;
/// Data center presets and impact figures.
pub mod impact;
/// Hosted model client.
pub mod llm;
/// Mock notifications and live push.
pub mod notifications;
/// Prompt builders for the hosted model.
pub mod prompts;
/// HTTP gateway.
pub mod server;
/// Persisted client state.
pub mod state;
/// Server-Sent Events parsing and stream sessions.
pub mod stream;
/// Mock teams.
pub mod teams;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, GatewayServer, SharedState};
