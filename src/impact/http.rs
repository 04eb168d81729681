use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::sources::{ClimateData, DataSources, EnergyData, FallbackDataSources, LocationData};
use crate::config::{DataApiConfig, RequestConfig};
use crate::error::{AppError, AppResult, ClientError, ClientResult};

/// Miles per hour to meters per second
const MPH_TO_MPS: f64 = 0.44704;
/// Census marker for an estimate that could not be computed
const CENSUS_MISSING: &str = "-666666666";

/// Base URLs of the public data APIs
#[derive(Debug, Clone)]
pub struct DataEndpoints {
    pub geocoder_url: String,
    pub acs_url: String,
    pub eia_url: String,
    pub weather_url: String,
}

impl Default for DataEndpoints {
    fn default() -> Self {
        Self {
            geocoder_url: "https://geocoding.geo.census.gov/geocoder/geographies/coordinates"
                .to_string(),
            acs_url: "https://api.census.gov/data/2021/acs/acs5".to_string(),
            eia_url: "https://api.eia.gov/v2/electricity/retail-sales/data/".to_string(),
            weather_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
        }
    }
}

impl DataEndpoints {
    /// All four services behind one base URL, for tests against a mock server
    pub fn at(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            geocoder_url: format!("{}/geocoder/geographies/coordinates", base),
            acs_url: format!("{}/data/2021/acs/acs5", base),
            eia_url: format!("{}/v2/electricity/retail-sales/data/", base),
            weather_url: format!("{}/data/2.5/weather", base),
        }
    }
}

/// County and state codes for a point
#[derive(Debug, Clone, PartialEq)]
struct CountyFips {
    state: String,
    county: String,
    postal: Option<String>,
}

/// Live lookups against the Census, EIA and OpenWeatherMap APIs.
///
/// Each lookup degrades on its own: a failed or unconfigured service yields
/// the fallback figures for that lookup and leaves the others live.
#[derive(Clone)]
pub struct HttpDataSources {
    client: Client,
    keys: DataApiConfig,
    endpoints: DataEndpoints,
    fallback: FallbackDataSources,
}

impl HttpDataSources {
    pub fn new(keys: &DataApiConfig, request: &RequestConfig) -> AppResult<Self> {
        Self::with_endpoints(keys, request, DataEndpoints::default())
    }

    pub fn with_endpoints(
        keys: &DataApiConfig,
        request: &RequestConfig,
        endpoints: DataEndpoints,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request.timeout_ms))
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build data client: {}", e),
            })?;

        Ok(Self {
            client,
            keys: keys.clone(),
            endpoints,
            fallback: FallbackDataSources,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> ClientResult<T> {
        debug!(url, "Data lookup");
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|e| ClientError::Decode {
            message: e.to_string(),
        })
    }

    async fn county_fips(&self, latitude: f64, longitude: f64) -> ClientResult<CountyFips> {
        let (x, y) = (longitude.to_string(), latitude.to_string());
        let body: Value = self
            .get_json(
                &self.endpoints.geocoder_url,
                &[
                    ("x", x.as_str()),
                    ("y", y.as_str()),
                    ("benchmark", "Public_AR_Current"),
                    ("vintage", "Current_Current"),
                    ("format", "json"),
                ],
            )
            .await?;

        let geographies = &body["result"]["geographies"];
        let county = &geographies["Counties"][0];
        match (county["STATE"].as_str(), county["COUNTY"].as_str()) {
            (Some(state), Some(code)) => Ok(CountyFips {
                state: state.to_string(),
                county: code.to_string(),
                postal: geographies["States"][0]["STUSAB"]
                    .as_str()
                    .map(str::to_string),
            }),
            _ => Err(ClientError::Decode {
                message: "No county at these coordinates".to_string(),
            }),
        }
    }

    async fn census_location(&self, latitude: f64, longitude: f64) -> ClientResult<LocationData> {
        let fips = self.county_fips(latitude, longitude).await?;
        let key = self.keys.census_api_key.as_deref().unwrap_or_default();
        let for_county = format!("county:{}", fips.county);
        let in_state = format!("state:{}", fips.state);

        let rows: Vec<Vec<Value>> = self
            .get_json(
                &self.endpoints.acs_url,
                &[
                    ("get", "NAME,B01003_001E,B19013_001E"),
                    ("for", for_county.as_str()),
                    ("in", in_state.as_str()),
                    ("key", key),
                ],
            )
            .await?;

        let row = rows.get(1).ok_or_else(|| ClientError::Decode {
            message: "Census response has no data row".to_string(),
        })?;
        let name = row
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(LocationData {
            name,
            population: census_count(row.get(1)),
            median_income: census_count(row.get(2)),
            state_code: fips.postal.unwrap_or(fips.state),
        })
    }

    async fn eia_price(&self, key: &str, state: &str) -> ClientResult<f64> {
        let body: Value = self
            .get_json(
                &self.endpoints.eia_url,
                &[
                    ("api_key", key),
                    ("frequency", "annual"),
                    ("data[0]", "price"),
                    ("facets[stateid][]", state),
                    ("facets[sectorid][]", "IND"),
                    ("sort[0][column]", "period"),
                    ("sort[0][direction]", "desc"),
                    ("length", "1"),
                ],
            )
            .await?;

        let price = &body["response"]["data"][0]["price"];
        let cents = price
            .as_f64()
            .or_else(|| price.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| ClientError::Decode {
                message: format!("No price for state {}", state),
            })?;
        Ok(cents / 100.0)
    }

    async fn weather(&self, key: &str, latitude: f64, longitude: f64) -> ClientResult<ClimateData> {
        let (lat, lon) = (latitude.to_string(), longitude.to_string());
        let body: Value = self
            .get_json(
                &self.endpoints.weather_url,
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("appid", key),
                    ("units", "imperial"),
                ],
            )
            .await?;

        let defaults = ClimateData::default();
        let temperature_f = body["main"]["temp"]
            .as_f64()
            .ok_or_else(|| ClientError::Decode {
                message: "Weather response has no temperature".to_string(),
            })?;

        Ok(ClimateData {
            temperature_f,
            humidity: body["main"]["humidity"].as_f64().unwrap_or(defaults.humidity),
            description: body["weather"][0]["description"]
                .as_str()
                .map(str::to_string)
                .unwrap_or(defaults.description),
            wind_speed_mps: body["wind"]["speed"]
                .as_f64()
                .map(|mph| mph * MPH_TO_MPS)
                .unwrap_or(defaults.wind_speed_mps),
            wind_direction_deg: body["wind"]["deg"]
                .as_f64()
                .unwrap_or(defaults.wind_direction_deg),
        })
    }
}

/// Read a census estimate, treating missing markers as zero
fn census_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::String(s)) if s != CENSUS_MISSING => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl DataSources for HttpDataSources {
    async fn location(&self, latitude: f64, longitude: f64) -> AppResult<LocationData> {
        if self.keys.census_api_key.is_none() {
            return self.fallback.location(latitude, longitude).await;
        }
        match self.census_location(latitude, longitude).await {
            Ok(location) => Ok(location),
            Err(e) => {
                warn!(error = %e, latitude, longitude, "Census lookup failed, using fallback");
                self.fallback.location(latitude, longitude).await
            }
        }
    }

    async fn energy(&self, location: &LocationData) -> AppResult<EnergyData> {
        let Some(key) = self.keys.eia_api_key.as_deref() else {
            return self.fallback.energy(location).await;
        };
        match self.eia_price(key, &location.state_code).await {
            Ok(price_per_kwh) => Ok(EnergyData {
                price_per_kwh,
                state: location.state_code.clone(),
            }),
            Err(e) => {
                warn!(error = %e, state = %location.state_code, "EIA lookup failed, using fallback");
                self.fallback.energy(location).await
            }
        }
    }

    async fn climate(&self, latitude: f64, longitude: f64) -> AppResult<ClimateData> {
        let Some(key) = self.keys.openweather_api_key.as_deref() else {
            return self.fallback.climate(latitude, longitude).await;
        };
        match self.weather(key, latitude, longitude).await {
            Ok(climate) => Ok(climate),
            Err(e) => {
                warn!(error = %e, latitude, longitude, "Weather lookup failed, using fallback");
                self.fallback.climate(latitude, longitude).await
            }
        }
    }
}
