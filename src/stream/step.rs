//! Named progress phases and their display mapping.
//!
//! This is a lookup table, not a state machine: steps may arrive in any
//! order, repeat, or be skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which structured summary a step carries in its `data` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Location,
    Energy,
    Climate,
    Impact,
}

/// A progress phase announced by the server
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Initializing,
    FetchingLocationData,
    FetchingEnergyData,
    FetchingClimateData,
    CalculatingImpact,
    GeneratingAnalysis,
    SimulatingForecast,
    Complete,
    Error,
    /// Any step name this table does not know
    Other(String),
}

impl Step {
    /// Wire name of the step
    pub fn as_str(&self) -> &str {
        match self {
            Step::Initializing => "initializing",
            Step::FetchingLocationData => "fetching_location_data",
            Step::FetchingEnergyData => "fetching_energy_data",
            Step::FetchingClimateData => "fetching_climate_data",
            Step::CalculatingImpact => "calculating_impact",
            Step::GeneratingAnalysis => "generating_analysis",
            Step::SimulatingForecast => "simulating_forecast",
            Step::Complete => "complete",
            Step::Error => "error",
            Step::Other(name) => name,
        }
    }

    /// Parse a step name; unknown names are kept verbatim
    pub fn from_name(name: &str) -> Self {
        match name {
            "initializing" => Step::Initializing,
            "fetching_location_data" => Step::FetchingLocationData,
            "fetching_energy_data" => Step::FetchingEnergyData,
            "fetching_climate_data" => Step::FetchingClimateData,
            "calculating_impact" => Step::CalculatingImpact,
            "generating_analysis" => Step::GeneratingAnalysis,
            "simulating_forecast" => Step::SimulatingForecast,
            "complete" => Step::Complete,
            "error" => Step::Error,
            other => Step::Other(other.to_string()),
        }
    }

    /// User-facing status text; unknown steps render their literal name
    pub fn status_text(&self) -> &str {
        match self {
            Step::Initializing => "Initializing analysis...",
            Step::FetchingLocationData => "Fetching location and population data...",
            Step::FetchingEnergyData => "Fetching regional energy pricing...",
            Step::FetchingClimateData => "Fetching local climate conditions...",
            Step::CalculatingImpact => "Calculating environmental impact...",
            Step::GeneratingAnalysis => "Generating AI analysis...",
            Step::SimulatingForecast => "Simulating forecast...",
            Step::Complete => "Analysis complete",
            Step::Error => "Analysis failed",
            Step::Other(name) => name,
        }
    }

    /// Steps whose `data` payload should be rendered as a structured summary
    pub fn summary_kind(&self) -> Option<SummaryKind> {
        match self {
            Step::FetchingLocationData => Some(SummaryKind::Location),
            Step::FetchingEnergyData => Some(SummaryKind::Energy),
            Step::FetchingClimateData => Some(SummaryKind::Climate),
            Step::CalculatingImpact => Some(SummaryKind::Impact),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Step {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Step::from_name(&name))
    }
}
