use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{ClientState, StateStore, STATE_KEY, STATE_SCHEMA_VERSION};
use crate::config::StateConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed client state
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (creating if needed) the state database
    pub async fn new(config: &StateConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Throwaway store for tests and one-off runs
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // Each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        debug!("Running state migrations");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct StateRow {
    version: i64,
    payload: String,
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> StorageResult<ClientState> {
        let row: Option<StateRow> =
            sqlx::query_as("SELECT version, payload FROM client_state WHERE key = ?")
                .bind(STATE_KEY)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(ClientState::default());
        };

        if row.version != i64::from(STATE_SCHEMA_VERSION) {
            warn!(
                stored = row.version,
                expected = STATE_SCHEMA_VERSION,
                "Ignoring client state from another schema version"
            );
            return Ok(ClientState::default());
        }

        match serde_json::from_str::<ClientState>(&row.payload) {
            Ok(state) => {
                debug!(valid_cache = state.has_valid_cache(), "Loaded client state");
                Ok(state)
            }
            Err(e) => {
                warn!(error = %e, "Stored client state is unreadable, starting fresh");
                Ok(ClientState::default())
            }
        }
    }

    async fn save(&self, state: &ClientState) -> StorageResult<()> {
        let mut state = state.clone();
        state.version = STATE_SCHEMA_VERSION;
        let payload = serde_json::to_string(&state)?;

        sqlx::query(
            r#"
            INSERT INTO client_state (key, version, payload, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                version = excluded.version,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(STATE_KEY)
        .bind(i64::from(STATE_SCHEMA_VERSION))
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(bytes = payload.len(), "Saved client state");
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        sqlx::query("DELETE FROM client_state WHERE key = ?")
            .bind(STATE_KEY)
            .execute(&self.pool)
            .await?;

        info!("Cleared client state");
        Ok(())
    }
}
