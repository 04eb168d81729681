//! Server-side pipelines behind the streaming endpoints.
//!
//! Each run is a spawned task writing `StreamEvent`s into a bounded channel.
//! The HTTP layer turns the receiving end into an SSE body. A run ends after
//! exactly one terminal event, or silently when the client goes away.

use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{AppError, LlmError, StreamError, StreamResult};
use crate::forecast::{
    circular_heatmap, simulate, ForecastReport, ForecastRequest, SiteConditions,
    DEFAULT_RADIUS_MILES,
};
use crate::impact::{
    calculate_impact, AnalysisRequest, ClimateData, DataCenterSpec, DataSources, EnergyData,
    ImpactReport, LocationData,
};
use crate::llm::{ChatRequest, LlmClient, Message};
use crate::prompts::{self, ANALYSIS_MAX_TOKENS};
use crate::stream::{Step, StreamEvent};

/// Events buffered per run before the producer waits on the client
const EVENT_BUFFER: usize = 64;

/// Stream of events for one run
pub type EventStream = ReceiverStream<StreamEvent>;

/// Coordinates echoed back in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub population: u64,
    pub median_income: u64,
}

/// Final payload of a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: String,
    pub location: ReportLocation,
    pub datacenter: DataCenterSpec,
    pub climate: ClimateData,
    pub energy_pricing: EnergyData,
    pub impact: ImpactReport,
    pub analysis: String,
}

/// Why a run stopped early
enum Halt {
    /// Receiver dropped
    Closed,
    Failed(String),
}

impl From<AppError> for Halt {
    fn from(e: AppError) -> Self {
        Halt::Failed(e.to_string())
    }
}

impl From<LlmError> for Halt {
    fn from(e: LlmError) -> Self {
        Halt::Failed(e.to_string())
    }
}

impl From<serde_json::Error> for Halt {
    fn from(e: serde_json::Error) -> Self {
        Halt::Failed(format!("Failed to encode event: {}", e))
    }
}

struct Emitter {
    tx: mpsc::Sender<StreamEvent>,
}

impl Emitter {
    async fn send(&self, event: StreamEvent) -> Result<(), Halt> {
        self.tx.send(event).await.map_err(|_| Halt::Closed)
    }

    async fn step<T: Serialize>(&self, step: Step, data: Option<&T>) -> Result<(), Halt> {
        let data = data.map(serde_json::to_value).transpose()?;
        debug!(step = %step, "Emitting step");
        self.send(StreamEvent::step(step, data)).await
    }

    /// Report the outcome of a run. Failures become the terminal error event.
    async fn finish(self, outcome: Result<(), Halt>, run: &'static str) {
        match outcome {
            Ok(()) => info!(run, "Stream run complete"),
            Err(Halt::Closed) => info!(run, "Client disconnected before the run finished"),
            Err(Halt::Failed(message)) => {
                error!(run, error = %message, "Stream run failed");
                let _ = self.tx.send(StreamEvent::error(message)).await;
            }
        }
    }
}

/// Runs impact analyses and forecasts for the gateway
#[derive(Clone)]
pub struct AnalysisPipeline {
    sources: Arc<dyn DataSources>,
    llm: LlmClient,
}

impl AnalysisPipeline {
    pub fn new(sources: Arc<dyn DataSources>, llm: LlmClient) -> Self {
        Self { sources, llm }
    }

    /// Start an impact analysis.
    ///
    /// Steps arrive in order: `initializing`, `fetching_location_data`,
    /// `fetching_energy_data`, `fetching_climate_data`, `calculating_impact`,
    /// `generating_analysis`, then one `analysis_chunk` per model delta and a
    /// final `complete` carrying the [`AnalysisReport`].
    pub fn analyze_stream(&self, request: AnalysisRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();

        let span = info_span!("stream_run", run = "analysis", run_id = %Uuid::new_v4());
        tokio::spawn(
            async move {
                let emitter = Emitter { tx };
                let outcome = pipeline.run_analysis(&request, &emitter).await;
                emitter.finish(outcome, "analysis").await;
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    /// Start a forecast: `initializing`, one `simulating_forecast` per year,
    /// then `complete` carrying the [`ForecastReport`].
    pub fn forecast_stream(&self, request: ForecastRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();

        let span = info_span!("stream_run", run = "forecast", run_id = %Uuid::new_v4());
        tokio::spawn(
            async move {
                let emitter = Emitter { tx };
                let outcome = pipeline.run_forecast(&request, &emitter).await;
                emitter.finish(outcome, "forecast").await;
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    /// Run an analysis to completion and return the report
    pub async fn analyze(&self, request: AnalysisRequest) -> StreamResult<Value> {
        let mut events = self.analyze_stream(request);
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Complete { report } => return Ok(report),
                StreamEvent::Error { message } => return Err(StreamError::Upstream { message }),
                _ => {}
            }
        }
        Err(StreamError::Upstream {
            message: "Analysis ended without a result".to_string(),
        })
    }

    async fn run_analysis(&self, request: &AnalysisRequest, out: &Emitter) -> Result<(), Halt> {
        request.validate().map_err(|e| Halt::Failed(e.to_string()))?;
        let (lat, lon) = (request.latitude, request.longitude);
        let spec = request.resolve_spec();

        info!(latitude = lat, longitude = lon, datacenter = %spec.name, "Starting impact analysis");
        out.step(Step::Initializing, Some(&json!({ "datacenter": spec })))
            .await?;

        let location = self.sources.location(lat, lon).await?;
        out.step(Step::FetchingLocationData, Some(&location)).await?;

        let energy = self.sources.energy(&location).await?;
        out.step(Step::FetchingEnergyData, Some(&energy)).await?;

        let climate = self.sources.climate(lat, lon).await?;
        out.step(Step::FetchingClimateData, Some(&climate)).await?;

        let impact = calculate_impact(&spec, &location, &energy, &climate);
        out.step(Step::CalculatingImpact, Some(&impact)).await?;

        out.step::<Value>(Step::GeneratingAnalysis, None).await?;
        let analysis = self
            .stream_analysis(&spec, &location, &energy, &climate, &impact, lat, lon, out)
            .await?;

        let report = AnalysisReport {
            timestamp: Utc::now().to_rfc3339(),
            location: ReportLocation {
                latitude: lat,
                longitude: lon,
                name: location.name.clone(),
                population: location.population,
                median_income: location.median_income,
            },
            datacenter: spec,
            climate,
            energy_pricing: energy,
            impact,
            analysis,
        };

        out.send(StreamEvent::complete(serde_json::to_value(&report)?))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_analysis(
        &self,
        spec: &DataCenterSpec,
        location: &LocationData,
        energy: &EnergyData,
        climate: &ClimateData,
        impact: &ImpactReport,
        lat: f64,
        lon: f64,
        out: &Emitter,
    ) -> Result<String, Halt> {
        let prompt = prompts::impact_analysis(spec, location, energy, climate, impact, lat, lon);
        let request = ChatRequest::new(self.llm.model(), vec![Message::user(prompt)])
            .with_max_tokens(ANALYSIS_MAX_TOKENS)
            .with_temperature(0.7);

        let mut deltas = self.llm.stream_completion(request).await?;
        let mut analysis = String::new();
        let mut chunks = 0usize;

        while let Some(delta) = deltas.next().await {
            let text = delta?;
            analysis.push_str(&text);
            chunks += 1;
            out.send(StreamEvent::chunk(text)).await?;
        }

        debug!(chunks, chars = analysis.len(), "Analysis text streamed");
        Ok(analysis)
    }

    async fn run_forecast(&self, request: &ForecastRequest, out: &Emitter) -> Result<(), Halt> {
        let settings = request.validate().map_err(|e| Halt::Failed(e.to_string()))?;
        let (lat, lon) = (request.latitude, request.longitude);

        info!(
            years = settings.years,
            scenario = settings.scenario.as_str(),
            initial_size_mw = settings.initial_size_mw,
            "Starting forecast"
        );
        out.step(Step::Initializing, Some(&settings)).await?;

        let climate = self.sources.climate(lat, lon).await?;
        let site = SiteConditions::from_climate(&climate);
        let frames = simulate(&settings, &site);

        for frame in &frames {
            out.step(Step::SimulatingForecast, Some(frame)).await?;
        }

        let report = ForecastReport {
            final_size_mw: settings.projected_size(),
            total_carbon_tons: frames
                .last()
                .map(|f| f.cumulative_carbon_tons)
                .unwrap_or_default(),
            heatmap: circular_heatmap(
                lon,
                lat,
                DEFAULT_RADIUS_MILES,
                Some(site.wind(climate.wind_direction_deg)),
            ),
            settings,
            frames,
        };

        out.send(StreamEvent::complete(serde_json::to_value(&report)?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, RequestConfig};
    use crate::impact::{FallbackDataSources, MockDataSources};

    fn offline_llm() -> LlmClient {
        LlmClient::new(
            &LlmConfig {
                api_key: None,
                base_url: "http://127.0.0.1:9".to_string(),
                model: "grok-2-1212".to_string(),
            },
            RequestConfig::default(),
        )
        .unwrap()
    }

    async fn collect(stream: EventStream) -> Vec<StreamEvent> {
        stream.collect().await
    }

    fn step_names(events: &[StreamEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Progress(update) => update.step.as_ref().map(|s| s.to_string()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_analysis_without_model_key_ends_with_error() {
        let pipeline = AnalysisPipeline::new(Arc::new(FallbackDataSources), offline_llm());
        let events = collect(pipeline.analyze_stream(AnalysisRequest::at(37.09, -95.71))).await;

        assert_eq!(
            step_names(&events),
            vec![
                "initializing",
                "fetching_location_data",
                "fetching_energy_data",
                "fetching_climate_data",
                "calculating_impact",
                "generating_analysis",
            ]
        );
        let last = events.last().unwrap();
        assert!(matches!(last, StreamEvent::Error { message } if message.contains("not configured")));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_fail_immediately() {
        let pipeline = AnalysisPipeline::new(Arc::new(FallbackDataSources), offline_llm());
        let events = collect(pipeline.analyze_stream(AnalysisRequest::at(120.0, 0.0))).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("latitude")));
    }

    #[tokio::test]
    async fn test_source_failure_becomes_error_event() {
        let mut sources = MockDataSources::new();
        sources.expect_location().returning(|_, _| {
            Err(AppError::Internal {
                message: "census offline".to_string(),
            })
        });

        let pipeline = AnalysisPipeline::new(Arc::new(sources), offline_llm());
        let events = collect(pipeline.analyze_stream(AnalysisRequest::at(37.0, -95.0))).await;

        assert_eq!(step_names(&events), vec!["initializing"]);
        assert!(matches!(events.last(), Some(StreamEvent::Error { message }) if message.contains("census offline")));
    }

    #[tokio::test]
    async fn test_forecast_stream_emits_frame_per_year() {
        let pipeline = AnalysisPipeline::new(Arc::new(FallbackDataSources), offline_llm());
        let mut request = ForecastRequest::at(37.09, -95.71);
        request.years = Some(3);

        let events = collect(pipeline.forecast_stream(request)).await;
        assert_eq!(
            step_names(&events),
            vec![
                "initializing",
                "simulating_forecast",
                "simulating_forecast",
                "simulating_forecast",
            ]
        );

        match events.last().unwrap() {
            StreamEvent::Complete { report } => {
                assert_eq!(report["frames"].as_array().unwrap().len(), 3);
                assert_eq!(report["heatmap"].as_array().unwrap().len(), 129);
                assert_eq!(report["settings"]["years"], json!(3));
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_collects_terminal_error() {
        let pipeline = AnalysisPipeline::new(Arc::new(FallbackDataSources), offline_llm());
        let result = pipeline.analyze(AnalysisRequest::at(37.0, -95.0)).await;
        match result {
            Err(StreamError::Upstream { message }) => assert!(message.contains("not configured")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }
}
