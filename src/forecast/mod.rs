//! Cosmetic growth forecast and map overlay model.
//!
//! Every coefficient here is a presentation choice; the output drives an
//! animation and is never persisted or checked against real data.

mod heat;

pub use heat::{
    circular_heatmap, heat_overlay, impact_level, wind_factor, HeatInputs, HeatOverlay,
    HeatPoint, Wind, CENTER_IMPACT, DEFAULT_RADIUS_MILES, HEATMAP_POINTS_PER_RING,
    HEATMAP_RINGS,
};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::impact::{annual_carbon_tons, validate_coordinates, ClimateData, DataCenterTier};

/// Longest horizon the simulator accepts
pub const MAX_FORECAST_YEARS: u32 = 50;

/// Growth scenario presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl Scenario {
    /// Annual growth in percent
    pub fn growth_rate(&self) -> f64 {
        match self {
            Scenario::Conservative => 5.0,
            Scenario::Moderate => 15.0,
            Scenario::Aggressive => 30.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Conservative => "conservative",
            Scenario::Moderate => "moderate",
            Scenario::Aggressive => "aggressive",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "conservative" => Some(Scenario::Conservative),
            "moderate" => Some(Scenario::Moderate),
            "aggressive" => Some(Scenario::Aggressive),
            _ => None,
        }
    }
}

/// Horizon, growth, and starting size of a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub years: u32,
    /// Percent per year
    pub growth_rate: f64,
    pub scenario: Scenario,
    pub initial_size_mw: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            years: 5,
            growth_rate: Scenario::Moderate.growth_rate(),
            scenario: Scenario::Moderate,
            initial_size_mw: DataCenterTier::Small.spec().power_mw,
        }
    }
}

impl ForecastSettings {
    /// Switch scenario, resetting the growth rate to its preset
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self.growth_rate = scenario.growth_rate();
        self
    }

    /// Start from a size preset's power draw
    pub fn with_size(mut self, tier: DataCenterTier) -> Self {
        self.initial_size_mw = tier.spec().power_mw;
        self
    }

    pub fn with_years(mut self, years: u32) -> Self {
        self.years = years;
        self
    }

    /// Size after `year` years of compound growth
    pub fn size_at(&self, year: u32) -> f64 {
        self.initial_size_mw * (1.0 + self.growth_rate / 100.0).powi(year as i32)
    }

    /// Size at the end of the horizon
    pub fn projected_size(&self) -> f64 {
        self.size_at(self.years)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.years == 0 || self.years > MAX_FORECAST_YEARS {
            return Err(ApiError::BadRequest(format!(
                "years must be between 1 and {}",
                MAX_FORECAST_YEARS
            )));
        }
        if !self.initial_size_mw.is_finite() || self.initial_size_mw <= 0.0 {
            return Err(ApiError::BadRequest(
                "initial size must be a positive number of MW".to_string(),
            ));
        }
        if !self.growth_rate.is_finite() || self.growth_rate <= -100.0 {
            return Err(ApiError::BadRequest(
                "growth rate must be greater than -100%".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body of `POST /api/forecast/stream`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    /// Overrides the scenario's preset rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
    /// Size preset name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Overrides the size preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_size_mw: Option<f64>,
}

impl ForecastRequest {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    /// Carry over everything from explicit settings
    pub fn with_settings(mut self, settings: &ForecastSettings) -> Self {
        self.years = Some(settings.years);
        self.scenario = Some(settings.scenario);
        self.growth_rate = Some(settings.growth_rate);
        self.initial_size_mw = Some(settings.initial_size_mw);
        self
    }

    /// Merge the request over the defaults
    pub fn settings(&self) -> ForecastSettings {
        let mut settings =
            ForecastSettings::default().with_scenario(self.scenario.unwrap_or_default());
        if let Some(years) = self.years {
            settings.years = years;
        }
        if let Some(rate) = self.growth_rate {
            settings.growth_rate = rate;
        }
        if let Some(tier) = self.size.as_deref().and_then(DataCenterTier::from_name) {
            settings = settings.with_size(tier);
        }
        if let Some(mw) = self.initial_size_mw {
            settings.initial_size_mw = mw;
        }
        settings
    }

    pub fn validate(&self) -> Result<ForecastSettings, ApiError> {
        validate_coordinates(self.latitude, self.longitude)?;
        let settings = self.settings();
        settings.validate()?;
        Ok(settings)
    }
}

/// Local conditions held constant across the simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteConditions {
    pub temperature_f: f64,
    pub wind_speed_mps: f64,
    pub pue: f64,
    pub max_radius_km: f64,
}

impl Default for SiteConditions {
    fn default() -> Self {
        let inputs = HeatInputs::default();
        Self {
            temperature_f: inputs.temperature_f,
            wind_speed_mps: inputs.wind_speed_mps,
            pue: inputs.pue,
            max_radius_km: inputs.max_radius_km,
        }
    }
}

/// Air-cooled baseline PUE
const BASE_PUE: f64 = 1.4;
/// PUE increase per degree above the cooling baseline
const PUE_TEMP_SENSITIVITY: f64 = 0.012;
const MAX_PUE: f64 = 2.0;

impl SiteConditions {
    /// Conditions derived from current weather
    pub fn from_climate(climate: &ClimateData) -> Self {
        let above = (climate.temperature_f - 70.0).max(0.0);
        Self {
            temperature_f: climate.temperature_f,
            wind_speed_mps: climate.wind_speed_mps,
            pue: (BASE_PUE + above * PUE_TEMP_SENSITIVITY).min(MAX_PUE),
            ..Default::default()
        }
    }

    pub fn wind(&self, direction_deg: f64) -> Wind {
        Wind {
            speed_mps: self.wind_speed_mps,
            direction_deg,
        }
    }
}

/// One simulated year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastFrame {
    pub year: u32,
    pub size_mw: f64,
    pub annual_carbon_tons: f64,
    pub cumulative_carbon_tons: f64,
    pub overlay: HeatOverlay,
    pub impact_level: String,
}

/// Summary sent with the terminal `complete` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub settings: ForecastSettings,
    pub final_size_mw: f64,
    pub total_carbon_tons: f64,
    pub frames: Vec<ForecastFrame>,
    pub heatmap: Vec<HeatPoint>,
}

/// Simulate one frame per year, years 1 through `settings.years`.
///
/// The overlay is scaled against the cumulative carbon of the final year, so
/// the last frame always reaches the full radius.
pub fn simulate(settings: &ForecastSettings, site: &SiteConditions) -> Vec<ForecastFrame> {
    let yearly: Vec<(u32, f64, f64)> = (1..=settings.years)
        .map(|year| {
            let size = settings.size_at(year);
            (year, size, annual_carbon_tons(size))
        })
        .collect();
    let total: f64 = yearly.iter().map(|(_, _, tons)| tons).sum();

    let mut cumulative = 0.0;
    yearly
        .into_iter()
        .map(|(year, size_mw, tons)| {
            cumulative += tons;
            let overlay = heat_overlay(&HeatInputs {
                carbon_tons: cumulative,
                max_carbon_tons: total,
                max_radius_km: site.max_radius_km,
                wind_speed_mps: site.wind_speed_mps,
                temperature_f: site.temperature_f,
                pue: site.pue,
            });
            ForecastFrame {
                year,
                size_mw,
                annual_carbon_tons: tons,
                cumulative_carbon_tons: cumulative,
                overlay,
                impact_level: impact_level(overlay.intensity).to_string(),
            }
        })
        .collect()
}
