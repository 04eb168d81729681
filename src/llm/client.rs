use futures::stream::{self, BoxStream};
use futures::{future, StreamExt};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{ChatRequest, ChatResponse, StreamChunk};
use crate::config::{LlmConfig, RequestConfig};
use crate::error::{LlmError, LlmResult};
use crate::stream::{LineParser, DATA_PREFIX};

/// Stream of text deltas from a streamed completion
pub type TextStream = BoxStream<'static, LlmResult<String>>;

/// Client for an OpenAI-compatible hosted chat model
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    request_config: RequestConfig,
}

impl LlmClient {
    /// Create a new LLM client.
    ///
    /// The client itself only bounds connecting and each body read. The
    /// overall deadline is set per request on `complete`, so a streamed
    /// completion can run as long as deltas keep arriving.
    pub fn new(config: &LlmConfig, request_config: RequestConfig) -> LlmResult<Self> {
        let per_read = Duration::from_millis(request_config.timeout_ms);
        let client = Client::builder()
            .connect_timeout(per_read)
            .read_timeout(per_read)
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_config,
        })
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Default model name for requests built by callers
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a chat completion and return the full response
    pub async fn complete(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    model = %request.model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying LLM request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(response) => {
                    info!(
                        model = %request.model,
                        latency_ms = start.elapsed().as_millis(),
                        "LLM completion succeeded"
                    );
                    return Ok(response);
                }
                Err(LlmError::NotConfigured) => return Err(LlmError::NotConfigured),
                Err(e) => {
                    error!(
                        model = %request.model,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "LLM completion failed"
                    );
                    if self.request_config.max_retries == 0 {
                        return Err(e);
                    }
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(LlmError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(&self, url: &str, request: &ChatRequest) -> LlmResult<ChatResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling chat completion"
        );

        let deadline = Duration::from_millis(self.request_config.timeout_ms);
        let response = self.send(url, request, Some(deadline)).await?;

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Run a streamed chat completion, yielding text deltas as they arrive.
    ///
    /// The upstream body is itself an SSE stream; `data: [DONE]` ends it.
    pub async fn stream_completion(&self, request: ChatRequest) -> LlmResult<TextStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = request.streaming();

        debug!(model = %request.model, "Opening streamed completion");
        let response = self.send(&url, &request, None).await?;
        let timeout_ms = self.request_config.timeout_ms;

        let deltas = response
            .bytes_stream()
            .scan(LineParser::new(), move |parser, chunk| {
                let items: Vec<LlmResult<Option<String>>> = match chunk {
                    Ok(bytes) => parser
                        .feed(&bytes)
                        .iter()
                        .filter_map(|line| decode_stream_line(line))
                        .collect(),
                    Err(e) if e.is_timeout() => vec![Err(LlmError::Timeout { timeout_ms })],
                    Err(e) => vec![Err(LlmError::Http(e))],
                };
                future::ready(Some(items))
            })
            .flat_map(stream::iter)
            .take_while(|item| future::ready(!matches!(item, Ok(None))))
            .filter_map(|item| future::ready(item.transpose()));

        Ok(deltas.boxed())
    }

    async fn send(
        &self,
        url: &str,
        request: &ChatRequest,
        deadline: Option<Duration>,
    ) -> LlmResult<reqwest::Response> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::NotConfigured)?;

        let mut builder = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        Ok(response)
    }
}

/// `Some(Ok(Some(text)))` for a delta, `Some(Ok(None))` for the end marker,
/// `None` for lines that carry nothing.
fn decode_stream_line(line: &str) -> Option<LlmResult<Option<String>>> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload == "[DONE]" {
        return Some(Ok(None));
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk.content().map(|text| Ok(Some(text.to_string()))),
        Err(e) => {
            warn!(error = %e, "Skipping malformed completion chunk");
            None
        }
    }
}
