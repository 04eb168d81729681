use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::api::ApiClient;
use crate::error::{AppError, AppResult};
use crate::forecast::{ForecastRequest, ForecastSettings, Scenario};
use crate::impact::{validate_coordinates, AnalysisRequest, DataCenterSpec, DataCenterTier};
use crate::state::{CacheInfo, ClientState, SavedConfig, SavedLocation, StateStore};
use crate::stream::{SessionState, StreamHandler, StreamSession};

/// The client's actions, wired to an API client and a state store.
///
/// Every change to location, configuration, or results is written through
/// to the store immediately.
pub struct AppController {
    api: ApiClient,
    store: Arc<dyn StateStore>,
    state: ClientState,
    forecast: ForecastSettings,
}

impl AppController {
    /// Build a controller, restoring whatever the store holds
    pub async fn load(api: ApiClient, store: Arc<dyn StateStore>) -> AppResult<Self> {
        let state = store.load().await?;
        if let Some(info) = state.cache_info(Utc::now()) {
            info!(age = %info.age, "Restored cached selection");
        }

        Ok(Self {
            api,
            store,
            state,
            forecast: ForecastSettings::default(),
        })
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn forecast_settings(&self) -> &ForecastSettings {
        &self.forecast
    }

    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.state.cache_info(Utc::now())
    }

    async fn persist(&self) -> AppResult<()> {
        self.store.save(&self.state).await?;
        Ok(())
    }

    /// Pick a point on the map
    pub async fn select_location(&mut self, lat: f64, lng: f64) -> AppResult<()> {
        validate_coordinates(lat, lng).map_err(|e| AppError::Validation {
            message: e.to_string(),
        })?;
        self.state.set_location(SavedLocation { lat, lng });
        self.persist().await
    }

    /// Use one of the size presets
    pub async fn select_preset(&mut self, tier: DataCenterTier) -> AppResult<()> {
        self.state.set_config(SavedConfig {
            preset: Some(tier),
            spec: tier.spec(),
        });
        self.persist().await
    }

    /// Use explicit facility figures
    pub async fn set_custom_config(&mut self, spec: DataCenterSpec) -> AppResult<()> {
        if !spec.power_mw.is_finite() || spec.power_mw <= 0.0 {
            return Err(AppError::Validation {
                message: "power_mw must be a positive number".to_string(),
            });
        }
        self.state.set_config(SavedConfig { preset: None, spec });
        self.persist().await
    }

    fn require_location(&self) -> AppResult<SavedLocation> {
        self.state.location.ok_or_else(|| AppError::Validation {
            message: "Select a location first".to_string(),
        })
    }

    /// Request body for the current selection; medium when nothing is chosen
    pub fn analysis_request(&self) -> AppResult<AnalysisRequest> {
        let location = self.require_location()?;
        let request = AnalysisRequest::at(location.lat, location.lng);

        Ok(match &self.state.config {
            Some(SavedConfig {
                preset: Some(tier), ..
            }) => request.with_size(*tier),
            Some(SavedConfig { preset: None, spec }) => request.with_custom_spec(spec),
            None => request.with_size(DataCenterTier::Medium),
        })
    }

    /// Stream an impact analysis for the current selection.
    ///
    /// A successful report is saved as the last analysis.
    pub async fn analyze_impact<H: StreamHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> AppResult<StreamSession> {
        let request = self.analysis_request()?;
        let session = self.api.analyze_stream(&request, handler).await;

        if session.state() == SessionState::Completed {
            if let Some(report) = session.report() {
                self.state.set_analysis(report.clone());
                self.persist().await?;
            }
        }

        Ok(session)
    }

    pub fn set_forecast_years(&mut self, years: u32) {
        self.forecast.years = years;
    }

    /// Switch scenario, which also resets the growth rate
    pub fn set_forecast_scenario(&mut self, scenario: Scenario) {
        self.forecast = self.forecast.clone().with_scenario(scenario);
    }

    pub fn set_forecast_size(&mut self, tier: DataCenterTier) {
        self.forecast = self.forecast.clone().with_size(tier);
    }

    /// Stream a growth forecast at the selected location
    pub async fn run_forecast<H: StreamHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> AppResult<StreamSession> {
        let location = self.require_location()?;
        self.forecast.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
        })?;

        info!(
            years = self.forecast.years,
            growth_rate = self.forecast.growth_rate,
            projected_mw = self.forecast.projected_size(),
            "Running forecast"
        );

        let request = ForecastRequest::at(location.lat, location.lng).with_settings(&self.forecast);
        Ok(self.api.forecast_stream(&request, handler).await)
    }

    /// Forget the selection and everything cached
    pub async fn reset(&mut self) -> AppResult<()> {
        self.state = ClientState::default();
        self.forecast = ForecastSettings::default();
        self.store.clear().await?;
        Ok(())
    }

    /// Back to the default forecast settings
    pub fn reset_forecast(&mut self) {
        self.forecast = ForecastSettings::default();
    }
}
