use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::SharedState;
use crate::error::{ApiError, ApiResult};
use crate::forecast::ForecastRequest;
use crate::impact::{AnalysisRequest, DataCenterSpec, DataCenterTier};
use crate::llm::{ChatRequest, Message};
use crate::notifications::{Notification, PushMessage};
use crate::prompts::{self, QUERY_MAX_TOKENS, SUGGESTIONS_MAX_TOKENS, SUMMARY_MAX_TOKENS};
use crate::stream::StreamEvent;
use crate::teams::{self, ActivityDay, Team};

/// Body of `POST /api/ai/query`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default, rename = "teamId", alias = "team_id")]
    pub team_id: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub notification: Notification,
}

/// Settings the client needs at startup
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub mapbox_token: Option<String>,
    pub model: String,
    pub llm_configured: bool,
}

/// Run one completion and return its text, mapping failures to a 500 with
/// the given context
async fn complete_text(
    state: &SharedState,
    route: &'static str,
    messages: Vec<Message>,
    max_tokens: u32,
    context: &'static str,
) -> ApiResult<String> {
    let start = Instant::now();
    let request = ChatRequest::new(state.llm.model(), messages).with_max_tokens(max_tokens);

    match state.llm.complete(request).await {
        Ok(response) => {
            info!(
                route,
                latency_ms = start.elapsed().as_millis(),
                "Model answered"
            );
            Ok(response.text().to_string())
        }
        Err(e) => {
            tracing::error!(route, error = %e, "{}", context);
            Err(ApiError::upstream(context, e))
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Backend server is running" }))
}

pub async fn client_settings(State(state): State<SharedState>) -> Json<ClientSettings> {
    Json(ClientSettings {
        api_base_url: state.config.client.api_base_url.clone(),
        mapbox_token: state.config.client.mapbox_token.clone(),
        model: state.llm.model().to_string(),
        llm_configured: state.llm.is_configured(),
    })
}

pub async fn ai_query(
    State(state): State<SharedState>,
    Json(body): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let question = body
        .question
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Question is required".to_string()))?;
    let team_id = body.team_id.unwrap_or_else(|| "undefined".to_string());

    info!(team_id = %team_id, "AI query");
    let answer = complete_text(
        &state,
        "ai_query",
        vec![
            Message::system(prompts::team_assistant_system(&team_id)),
            Message::user(question),
        ],
        QUERY_MAX_TOKENS,
        "Failed to process AI query",
    )
    .await?;

    Ok(Json(QueryResponse { answer }))
}

pub async fn team_summary(
    State(state): State<SharedState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<SummaryResponse>> {
    let summary = complete_text(
        &state,
        "team_summary",
        vec![Message::user(prompts::team_summary(&team_id))],
        SUMMARY_MAX_TOKENS,
        "Failed to generate team summary",
    )
    .await?;

    Ok(Json(SummaryResponse { summary }))
}

pub async fn team_suggestions(
    State(state): State<SharedState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<SuggestionsResponse>> {
    let text = complete_text(
        &state,
        "team_suggestions",
        vec![Message::user(prompts::team_suggestions(&team_id))],
        SUGGESTIONS_MAX_TOKENS,
        "Failed to generate suggestions",
    )
    .await?;

    Ok(Json(SuggestionsResponse {
        suggestions: prompts::split_suggestions(&text),
    }))
}

pub async fn list_notifications(State(state): State<SharedState>) -> Json<Vec<Notification>> {
    Json(state.notifications.list().await)
}

pub async fn mark_notification_read(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MarkReadResponse>> {
    let not_found = || ApiError::NotFound("Notification not found".to_string());
    let id: u64 = id.parse().map_err(|_| not_found())?;

    let notification = state.notifications.mark_read(id).await.ok_or_else(not_found)?;
    Ok(Json(MarkReadResponse {
        success: true,
        notification,
    }))
}

pub async fn mark_all_notifications_read(State(state): State<SharedState>) -> Json<Value> {
    state.notifications.mark_all_read().await;
    Json(json!({ "success": true, "message": "All notifications marked as read" }))
}

pub async fn list_teams() -> Json<Vec<Team>> {
    Json(teams::all())
}

pub async fn get_team(Path(team_id): Path<String>) -> ApiResult<Json<Team>> {
    teams::find(&team_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))
}

pub async fn team_activity(Path(team_id): Path<String>) -> Json<Vec<ActivityDay>> {
    Json(teams::activity(&team_id))
}

pub async fn datacenter_types() -> Json<BTreeMap<&'static str, DataCenterSpec>> {
    Json(DataCenterTier::catalog())
}

/// Live notification push. The first frame is always `connected`.
pub async fn notification_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    info!(
        subscribers = state.hub.subscriber_count(),
        "Notification stream opened"
    );

    let pushed = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "Notification stream lagged");
            None
        }
    });

    let frames = tokio_stream::once(PushMessage::connected())
        .chain(pushed)
        .filter_map(|message| match serde_json::to_string(&message) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                warn!(error = %e, "Failed to serialize push message");
                None
            }
        });

    Sse::new(until_shutdown(&state, frames)).keep_alive(KeepAlive::default())
}

/// End an open-ended stream when the gateway starts shutting down, so
/// graceful shutdown does not wait on connected clients
fn until_shutdown<S>(
    state: &SharedState,
    stream: S,
) -> impl Stream<Item = S::Item> + Send + 'static
where
    S: Stream + Send + 'static,
{
    futures::StreamExt::take_until(stream, state.shutdown.clone().cancelled_owned())
}

fn event_frames(
    state: &SharedState,
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = events.map(|event| Ok(Event::default().data(event.to_value().to_string())));
    Sse::new(until_shutdown(state, frames)).keep_alive(KeepAlive::default())
}

pub async fn analyze_stream(
    State(state): State<SharedState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    request.validate()?;
    info!(
        latitude = request.latitude,
        longitude = request.longitude,
        "Analysis stream requested"
    );
    Ok(event_frames(&state, state.pipeline.analyze_stream(request)))
}

pub async fn forecast_stream(
    State(state): State<SharedState>,
    Json(request): Json<ForecastRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    request.validate()?;
    info!(
        latitude = request.latitude,
        longitude = request.longitude,
        "Forecast stream requested"
    );
    Ok(event_frames(&state, state.pipeline.forecast_stream(request)))
}

/// Whole analysis in one response
pub async fn analyze(
    State(state): State<SharedState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;
    state
        .pipeline
        .analyze(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("Failed to analyze location", e))
}
