use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub request: RequestConfig,
    pub logging: LoggingConfig,
    pub state: StateConfig,
    pub client: ClientConfig,
    pub notifications: NotificationConfig,
    pub data: DataApiConfig,
}

/// Gateway listen address
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Hosted model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Absent key keeps the gateway up; AI routes then report the failure.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Persisted client state location
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Settings the client side needs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Empty means relative paths behind a reverse proxy.
    pub api_base_url: String,
    pub mapbox_token: Option<String>,
}

/// Demo notification broadcaster settings
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub interval_ms: u64,
    pub probability: f64,
    pub capacity: usize,
}

/// Keys for the public data APIs behind an impact analysis.
///
/// A lookup whose key is missing uses the fallback figures instead.
#[derive(Debug, Clone, Default)]
pub struct DataApiConfig {
    pub census_api_key: Option<String>,
    pub eia_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
}

impl DataApiConfig {
    /// Whether any live lookup is possible
    pub fn has_any_key(&self) -> bool {
        self.census_api_key.is_some()
            || self.eia_api_key.is_some()
            || self.openweather_api_key.is_some()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: match env::var("PORT") {
                Ok(raw) => raw.parse().map_err(|_| AppError::Config {
                    message: format!("PORT must be a valid port number, got '{}'", raw),
                })?,
                Err(_) => 3001,
            },
        };

        let llm = LlmConfig {
            api_key: env::var("XAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.x.ai".to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "grok-2-1212".to_string()),
        };

        let request = RequestConfig {
            timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 30000),
            max_retries: parse_or("MAX_RETRIES", 0),
            retry_delay_ms: parse_or("RETRY_DELAY_MS", 1000),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let state = StateConfig {
            path: PathBuf::from(
                env::var("STATE_DB_PATH").unwrap_or_else(|_| "./data/client_state.db".to_string()),
            ),
            max_connections: parse_or("STATE_DB_MAX_CONNECTIONS", 1),
        };

        let client = ClientConfig {
            api_base_url: env::var("API_BASE_URL").unwrap_or_default(),
            mapbox_token: env::var("MAPBOX_TOKEN").ok().filter(|t| !t.is_empty()),
        };

        let notifications = NotificationConfig {
            interval_ms: parse_or("NOTIFY_INTERVAL_MS", 30000),
            probability: parse_or::<f64>("NOTIFY_PROBABILITY", 0.3).clamp(0.0, 1.0),
            capacity: parse_or("NOTIFY_CAPACITY", 64).max(1),
        };

        let data = DataApiConfig {
            census_api_key: optional_var("CENSUS_API_KEY"),
            eia_api_key: optional_var("EIA_API_KEY"),
            openweather_api_key: optional_var("OPENWEATHER_API_KEY"),
        };

        Ok(Config {
            server,
            llm,
            request,
            logging,
            state,
            client,
            notifications,
            data,
        })
    }

    /// Socket address string for the gateway listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 0,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30000,
            probability: 0.3,
            capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
