//! Persisted client state.
//!
//! The client remembers the selected location, the facility configuration,
//! and the last analysis between runs. State is stored as one versioned JSON
//! document; a document written under another schema version is ignored.

mod sqlite;

pub use sqlite::SqliteStateStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;
use crate::impact::{DataCenterSpec, DataCenterTier};

/// Current layout of [`ClientState`]
pub const STATE_SCHEMA_VERSION: u32 = 1;
/// Row key the state document lives under
pub const STATE_KEY: &str = "evolv_app_state";

/// A selected map location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    pub lat: f64,
    pub lng: f64,
}

/// The facility configuration last used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConfig {
    /// Preset the figures came from, absent for custom figures
    pub preset: Option<DataCenterTier>,
    pub spec: DataCenterSpec,
}

/// Everything the client keeps between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    pub version: u32,
    pub location: Option<SavedLocation>,
    pub config: Option<SavedConfig>,
    pub last_analysis: Option<Value>,
    /// When any field last changed
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            version: STATE_SCHEMA_VERSION,
            location: None,
            config: None,
            last_analysis: None,
            timestamp: None,
        }
    }
}

/// Summary of the cached selection for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub location: SavedLocation,
    pub config: SavedConfig,
    pub age: String,
    pub timestamp: DateTime<Utc>,
}

impl ClientState {
    pub fn set_location(&mut self, location: SavedLocation) {
        self.location = Some(location);
        self.touch();
    }

    pub fn set_config(&mut self, config: SavedConfig) {
        self.config = Some(config);
        self.touch();
    }

    pub fn set_analysis(&mut self, report: Value) {
        self.last_analysis = Some(report);
        self.touch();
    }

    fn touch(&mut self) {
        self.timestamp = Some(Utc::now());
    }

    /// A cache is usable once both a location and a config are known
    pub fn has_valid_cache(&self) -> bool {
        self.location.is_some() && self.config.is_some()
    }

    /// Whole minutes since the last change
    pub fn cache_age_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.timestamp
            .map(|ts| (now - ts).num_minutes().max(0))
    }

    /// Cached selection with a human readable age, if the cache is valid
    pub fn cache_info(&self, now: DateTime<Utc>) -> Option<CacheInfo> {
        if !self.has_valid_cache() {
            return None;
        }
        let timestamp = self.timestamp?;
        let minutes = self.cache_age_minutes(now).unwrap_or_default();

        Some(CacheInfo {
            location: self.location?,
            config: self.config.clone()?,
            age: format_age(minutes),
            timestamp,
        })
    }
}

/// "N minute(s) ago" below an hour, "N hour(s) ago" after
pub fn format_age(minutes: i64) -> String {
    fn plural(n: i64) -> &'static str {
        if n == 1 {
            ""
        } else {
            "s"
        }
    }

    if minutes < 60 {
        format!("{} minute{} ago", minutes, plural(minutes))
    } else {
        let hours = minutes / 60;
        format!("{} hour{} ago", hours, plural(hours))
    }
}

/// Load/save contract for persisted client state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state, or the default when nothing usable is stored
    async fn load(&self) -> StorageResult<ClientState>;

    /// Replace the stored state
    async fn save(&self, state: &ClientState) -> StorageResult<()>;

    /// Remove the stored state
    async fn clear(&self) -> StorageResult<()>;
}
