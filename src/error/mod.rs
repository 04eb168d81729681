use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Persisted client state errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("State encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Hosted language model errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    NotConfigured,

    #[error("LLM unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that terminate a streaming session
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("API request failed: {status}")]
    Status { status: u16 },

    #[error("Stream read failed: {message}")]
    Transport { message: String },

    #[error("{message}")]
    Upstream { message: String },
}

/// Errors from REST calls made by the client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API request failed: {status}")]
    Status { status: u16 },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {message}")]
    Decode { message: String },
}

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {message}")]
    Upstream { context: String, message: String },
}

impl ApiError {
    /// Wrap an upstream failure with the user-facing context string
    pub fn upstream(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ApiError::Upstream {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(error) | ApiError::NotFound(error) => json!({ "error": error }),
            ApiError::Upstream { context, message } => {
                json!({ "error": context, "message": message })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for streaming sessions
pub type StreamResult<T> = Result<T, StreamError>;

/// Result type alias for client REST calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;
