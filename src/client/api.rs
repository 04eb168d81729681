use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RequestConfig};
use crate::error::{ClientError, ClientResult, StreamError};
use crate::forecast::ForecastRequest;
use crate::impact::{AnalysisRequest, DataCenterSpec};
use crate::notifications::{Notification, PushMessage};
use crate::server::{
    ClientSettings, MarkReadResponse, QueryRequest, QueryResponse, SuggestionsResponse,
    SummaryResponse,
};
use crate::stream::{consume_response, parse_data_line, LineParser, StreamHandler, StreamSession};
use crate::teams::{ActivityDay, Team};

/// Pick the base URL requests are made against.
///
/// An empty `api_base_url` means the API shares the origin the client was
/// served from, so paths stay relative to `origin`. Anything else is an
/// absolute base used as-is.
pub fn resolve_base_url(api_base_url: &str, origin: &str) -> String {
    let base = if api_base_url.trim().is_empty() {
        origin
    } else {
        api_base_url
    };
    base.trim_end_matches('/').to_string()
}

/// HTTP client for the gateway API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client against an explicit base URL
    pub fn new(base_url: &str, request_config: &RequestConfig) -> ClientResult<Self> {
        // No overall timeout: streams stay open as long as the server writes
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(request_config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client for the configured gateway
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let host = match config.server.host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };
        let origin = format!("http://{}:{}", host, config.server.port);
        let base_url = resolve_base_url(&config.client.api_base_url, &origin);
        Self::new(&base_url, &config.request)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            error!(status = status.as_u16(), url = %response.url(), "API request failed");
            Err(ClientError::Status {
                status: status.as_u16(),
            })
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let response = Self::check(response)?;
        response.json::<T>().await.map_err(|e| ClientError::Decode {
            message: e.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn patch<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        debug!(path, "PATCH");
        let response = self.client.patch(self.url(path)).send().await?;
        Self::decode(response).await
    }

    pub async fn health(&self) -> ClientResult<Value> {
        self.get("/health").await
    }

    pub async fn settings(&self) -> ClientResult<ClientSettings> {
        self.get("/api/config").await
    }

    pub async fn teams(&self) -> ClientResult<Vec<Team>> {
        self.get("/api/teams").await
    }

    pub async fn team(&self, team_id: &str) -> ClientResult<Team> {
        self.get(&format!("/api/teams/{}", team_id)).await
    }

    pub async fn team_activity(&self, team_id: &str) -> ClientResult<Vec<ActivityDay>> {
        self.get(&format!("/api/teams/{}/activity", team_id)).await
    }

    pub async fn notifications(&self) -> ClientResult<Vec<Notification>> {
        self.get("/api/notifications").await
    }

    pub async fn mark_read(&self, id: u64) -> ClientResult<Notification> {
        let response: MarkReadResponse =
            self.patch(&format!("/api/notifications/{}/read", id)).await?;
        Ok(response.notification)
    }

    pub async fn mark_all_read(&self) -> ClientResult<()> {
        let _: Value = self.patch("/api/notifications/read-all").await?;
        Ok(())
    }

    /// Ask the team assistant a question
    pub async fn ask(&self, team_id: &str, question: &str) -> ClientResult<String> {
        let body = QueryRequest {
            team_id: Some(team_id.to_string()),
            question: Some(question.to_string()),
        };
        let response: QueryResponse = self.post("/api/ai/query", &body).await?;
        Ok(response.answer)
    }

    pub async fn team_summary(&self, team_id: &str) -> ClientResult<String> {
        let response: SummaryResponse =
            self.get(&format!("/api/ai/team-summary/{}", team_id)).await?;
        Ok(response.summary)
    }

    pub async fn suggestions(&self, team_id: &str) -> ClientResult<Vec<String>> {
        let response: SuggestionsResponse =
            self.get(&format!("/api/ai/suggestions/{}", team_id)).await?;
        Ok(response.suggestions)
    }

    pub async fn datacenter_types(&self) -> ClientResult<BTreeMap<String, DataCenterSpec>> {
        self.get("/api/datacenter-types").await
    }

    /// Run a streamed analysis, dispatching events to `handler`
    pub async fn analyze_stream<H: StreamHandler + ?Sized>(
        &self,
        request: &AnalysisRequest,
        handler: &mut H,
    ) -> StreamSession {
        self.open_stream("/api/analyze/stream", request, handler)
            .await
    }

    /// Run a streamed forecast, dispatching events to `handler`
    pub async fn forecast_stream<H: StreamHandler + ?Sized>(
        &self,
        request: &ForecastRequest,
        handler: &mut H,
    ) -> StreamSession {
        self.open_stream("/api/forecast/stream", request, handler)
            .await
    }

    async fn open_stream<B: Serialize, H: StreamHandler + ?Sized>(
        &self,
        path: &str,
        body: &B,
        handler: &mut H,
    ) -> StreamSession {
        let mut session = StreamSession::new();
        info!(path, "Opening event stream");

        let sent = self
            .client
            .post(self.url(path))
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await;

        match sent {
            Ok(response) => {
                consume_response(response, &mut session, handler).await;
            }
            Err(e) => {
                error!(path, error = %e, "Failed to open event stream");
                session.fail(
                    StreamError::Transport {
                        message: e.to_string(),
                    },
                    handler,
                );
            }
        }

        session
    }

    /// Follow the notification push stream.
    ///
    /// `on_message` is called for every frame; returning `false` stops
    /// following. Returns when the server closes the stream.
    pub async fn watch_notifications<F>(&self, mut on_message: F) -> ClientResult<()>
    where
        F: FnMut(PushMessage) -> bool,
    {
        let response = self
            .client
            .get(self.url("/api/sse/notifications"))
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response)?;

        let mut parser = LineParser::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in parser.feed(&chunk) {
                let value = match parse_data_line(&line) {
                    Some(Ok(value)) => value,
                    Some(Err(e)) => {
                        warn!(error = %e, "Skipping malformed push frame");
                        continue;
                    }
                    None => continue,
                };
                match serde_json::from_value::<PushMessage>(value) {
                    Ok(message) => {
                        if !on_message(message) {
                            return Ok(());
                        }
                    }
                    Err(e) => warn!(error = %e, "Skipping unknown push frame"),
                }
            }
        }

        info!("Notification stream closed by server");
        Ok(())
    }
}
