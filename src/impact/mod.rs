//! Data center presets and the figures an impact analysis is built from.
//!
//! The numbers are presentation estimates with fixed coefficients; nothing
//! here is validated against measured data.

mod calculate;
mod http;
mod sources;

pub use calculate::{
    annual_carbon_tons, calculate_impact, CarbonImpact, EconomicImpact, EnergyImpact,
    ImpactReport, WaterImpact,
};
pub use http::{DataEndpoints, HttpDataSources};
pub use sources::{ClimateData, DataSources, EnergyData, FallbackDataSources, LocationData};

#[cfg(test)]
pub use sources::MockDataSources;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ApiError;

/// Gallons of cooling water per server per day for air-cooled halls
pub const WATER_GALLONS_PER_SERVER: u64 = 180;

/// Physical and staffing figures for one facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCenterSpec {
    pub name: String,
    pub power_mw: f64,
    pub servers: u32,
    pub square_feet: u32,
    pub water_gallons_per_day: u64,
    pub employees: u32,
}

/// Named size presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCenterTier {
    Small,
    Medium,
    Large,
    Mega,
}

impl DataCenterTier {
    /// All presets, smallest first
    pub const ALL: [DataCenterTier; 4] = [
        DataCenterTier::Small,
        DataCenterTier::Medium,
        DataCenterTier::Large,
        DataCenterTier::Mega,
    ];

    /// Wire name of the preset
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCenterTier::Small => "small",
            DataCenterTier::Medium => "medium",
            DataCenterTier::Large => "large",
            DataCenterTier::Mega => "mega",
        }
    }

    /// Parse a preset name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "small" => Some(DataCenterTier::Small),
            "medium" => Some(DataCenterTier::Medium),
            "large" => Some(DataCenterTier::Large),
            "mega" => Some(DataCenterTier::Mega),
            _ => None,
        }
    }

    /// Facility figures for this preset
    pub fn spec(&self) -> DataCenterSpec {
        let (name, power_mw, servers, square_feet, water, employees) = match self {
            DataCenterTier::Small => ("Small Edge Data Center", 1.0, 100, 5_000, 25_000, 10),
            DataCenterTier::Medium => {
                ("Medium Enterprise Data Center", 10.0, 1_000, 50_000, 300_000, 50)
            }
            DataCenterTier::Large => {
                ("Large Hyperscale Data Center", 50.0, 10_000, 250_000, 1_500_000, 200)
            }
            DataCenterTier::Mega => {
                ("Mega Hyperscale Data Center", 150.0, 50_000, 750_000, 5_000_000, 500)
            }
        };
        DataCenterSpec {
            name: name.to_string(),
            power_mw,
            servers,
            square_feet,
            water_gallons_per_day: water,
            employees,
        }
    }

    /// Preset table keyed by name, as served by `/api/datacenter-types`
    pub fn catalog() -> BTreeMap<&'static str, DataCenterSpec> {
        Self::ALL.iter().map(|t| (t.as_str(), t.spec())).collect()
    }
}

/// Body of `POST /api/analyze/stream`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Preset name; unknown or absent falls back to medium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// When true the explicit figures below override the preset
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_mw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_gallons_per_day: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<u32>,
}

impl AnalysisRequest {
    /// Request for a preset at a location
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    /// Select a size preset
    pub fn with_size(mut self, tier: DataCenterTier) -> Self {
        self.size = Some(tier.as_str().to_string());
        self
    }

    /// Use explicit facility figures
    pub fn with_custom_spec(mut self, spec: &DataCenterSpec) -> Self {
        self.custom = true;
        self.name = Some(spec.name.clone());
        self.power_mw = Some(spec.power_mw);
        self.servers = Some(spec.servers);
        self.square_feet = Some(spec.square_feet);
        self.water_gallons_per_day = Some(spec.water_gallons_per_day);
        self.employees = Some(spec.employees);
        self
    }

    /// Reject coordinates that cannot be on a map
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_coordinates(self.latitude, self.longitude)
    }

    /// Facility figures this request describes
    pub fn resolve_spec(&self) -> DataCenterSpec {
        if self.custom {
            let servers = self.servers.unwrap_or(1_000);
            DataCenterSpec {
                name: self
                    .name
                    .clone()
                    .unwrap_or_else(|| "Custom Data Center".to_string()),
                power_mw: self.power_mw.unwrap_or(10.0),
                servers,
                square_feet: self.square_feet.unwrap_or(50_000),
                water_gallons_per_day: self
                    .water_gallons_per_day
                    .unwrap_or(servers as u64 * WATER_GALLONS_PER_SERVER),
                employees: self.employees.unwrap_or(50),
            }
        } else {
            self.size
                .as_deref()
                .and_then(DataCenterTier::from_name)
                .unwrap_or(DataCenterTier::Medium)
                .spec()
        }
    }
}

/// Latitude must be within ±90 and longitude within ±180
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ApiError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ApiError::BadRequest(format!(
            "latitude must be between -90 and 90, got {}",
            latitude
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::BadRequest(format!(
            "longitude must be between -180 and 180, got {}",
            longitude
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tier_specs() {
        let small = DataCenterTier::Small.spec();
        assert_eq!(small.power_mw, 1.0);
        assert_eq!(small.servers, 100);
        assert_eq!(DataCenterTier::Mega.spec().employees, 500);
        assert_eq!(DataCenterTier::catalog().len(), 4);
    }

    #[test]
    fn test_resolve_spec_defaults_to_medium() {
        let request = AnalysisRequest::at(40.0, -100.0);
        assert_eq!(request.resolve_spec(), DataCenterTier::Medium.spec());

        let request: AnalysisRequest =
            serde_json::from_value(json!({"latitude": 1.0, "longitude": 2.0, "size": "gigantic"}))
                .unwrap();
        assert_eq!(request.resolve_spec(), DataCenterTier::Medium.spec());
    }

    #[test]
    fn test_resolve_spec_uses_preset() {
        let request = AnalysisRequest::at(40.0, -100.0).with_size(DataCenterTier::Large);
        assert_eq!(request.resolve_spec().name, "Large Hyperscale Data Center");
    }

    #[test]
    fn test_custom_spec_derives_water_from_servers() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "latitude": 40.0,
            "longitude": -100.0,
            "custom": true,
            "power_mw": 4.5,
            "servers": 200
        }))
        .unwrap();

        let spec = request.resolve_spec();
        assert_eq!(spec.name, "Custom Data Center");
        assert_eq!(spec.power_mw, 4.5);
        assert_eq!(spec.water_gallons_per_day, 36_000);
        assert_eq!(spec.employees, 50);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(validate_coordinates(37.09, -95.71).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }
}
