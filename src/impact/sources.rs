use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// Population and naming for the selected coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub name: String,
    pub population: u64,
    pub median_income: u64,
    pub state_code: String,
}

/// Retail electricity pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyData {
    pub price_per_kwh: f64,
    pub state: String,
}

/// Current weather at the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateData {
    pub temperature_f: f64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed_mps: f64,
    /// Degrees clockwise from north
    pub wind_direction_deg: f64,
}

impl Default for ClimateData {
    fn default() -> Self {
        Self {
            temperature_f: 70.0,
            humidity: 50.0,
            description: "Unknown".to_string(),
            wind_speed_mps: 5.0,
            wind_direction_deg: 0.0,
        }
    }
}

/// Lookups that feed an impact analysis.
///
/// Implementations may call external services; the pipeline reports a
/// failure as a terminal `error` event.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSources: Send + Sync {
    /// Population data around the coordinates
    async fn location(&self, latitude: f64, longitude: f64) -> AppResult<LocationData>;

    /// Electricity pricing for the location's state
    async fn energy(&self, location: &LocationData) -> AppResult<EnergyData>;

    /// Weather at the coordinates
    async fn climate(&self, latitude: f64, longitude: f64) -> AppResult<ClimateData>;
}

/// Static figures used when no data provider is wired in
#[derive(Debug, Clone, Default)]
pub struct FallbackDataSources;

/// National average industrial rate, dollars per kWh
pub const FALLBACK_PRICE_PER_KWH: f64 = 0.11;
/// Population assumed when no census lookup is available
pub const FALLBACK_POPULATION: u64 = 100_000;

#[async_trait]
impl DataSources for FallbackDataSources {
    async fn location(&self, latitude: f64, longitude: f64) -> AppResult<LocationData> {
        Ok(LocationData {
            name: format!("Area near {:.4}, {:.4}", latitude, longitude),
            population: FALLBACK_POPULATION,
            median_income: 0,
            state_code: "US".to_string(),
        })
    }

    async fn energy(&self, location: &LocationData) -> AppResult<EnergyData> {
        Ok(EnergyData {
            price_per_kwh: FALLBACK_PRICE_PER_KWH,
            state: location.state_code.clone(),
        })
    }

    async fn climate(&self, _latitude: f64, _longitude: f64) -> AppResult<ClimateData> {
        Ok(ClimateData::default())
    }
}
