//! Client tests: API calls against a mock gateway, and the controller's
//! write-through to a SQLite state store on disk.

use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_test::assert_ok;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use evolv_gateway::client::{ApiClient, AppController};
use evolv_gateway::config::{RequestConfig, StateConfig};
use evolv_gateway::error::{AppError, ClientError, StreamError};
use evolv_gateway::forecast::Scenario;
use evolv_gateway::impact::{DataCenterSpec, DataCenterTier};
use evolv_gateway::notifications::PushMessage;
use evolv_gateway::state::{SqliteStateStore, StateStore};
use evolv_gateway::stream::{SessionState, StreamHandler};

fn api(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), &RequestConfig::default()).unwrap()
}

fn sse(frames: &[Value]) -> ResponseTemplate {
    let body: String = frames.iter().map(|f| format!("data: {}\n\n", f)).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// Handler that only keeps the outcome
#[derive(Default)]
struct Outcome {
    report: Option<Value>,
    error: Option<String>,
}

impl StreamHandler for Outcome {
    fn on_complete(&mut self, report: &Value) {
        self.report = Some(report.clone());
    }

    fn on_error(&mut self, error: &StreamError) {
        self.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod api_client_tests {
    use super::*;

    #[tokio::test]
    async fn test_teams_and_missing_team() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/teams/backend"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "backend", "name": "Backend Team", "lead": "Sarah Chen",
                "members": 10, "focus": "API v3 Migration"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/teams/sales"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "Team not found" })),
            )
            .mount(&server)
            .await;

        let client = api(&server);
        let team = client.team("backend").await.unwrap();
        assert_eq!(team.lead, "Sarah Chen");

        let missing = client.team("sales").await;
        assert!(matches!(missing, Err(ClientError::Status { status: 404 })));
    }

    #[tokio::test]
    async fn test_ask_sends_team_and_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ai/query"))
            .and(body_partial_json(json!({ "teamId": "mobile", "question": "Status?" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "Shipping Friday." })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = api(&server).ask("mobile", "Status?").await.unwrap();
        assert_eq!(answer, "Shipping Friday.");
    }

    #[tokio::test]
    async fn test_mark_read_returns_updated_notification() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/notifications/2/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "notification": {
                    "id": 2, "type": "update", "title": "Sprint Planning Complete",
                    "message": "done", "time": "1 hour ago", "unread": false
                }
            })))
            .mount(&server)
            .await;

        let notification = api(&server).mark_read(2).await.unwrap();
        assert_eq!(notification.id, 2);
        assert_eq!(notification.kind, "update");
        assert!(!notification.unread);
    }

    #[tokio::test]
    async fn test_watch_notifications_stops_when_asked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sse/notifications"))
            .respond_with(sse(&[
                json!({ "type": "connected", "message": "Connected to notification stream" }),
                json!({ "type": "shrug" }),
                json!({ "type": "notification", "data": {
                    "id": 1700000000000u64, "type": "alert", "title": "High CPU Usage",
                    "message": "Server load at 85%", "time": "Just now", "unread": true
                }}),
                json!({ "type": "connected", "message": "never seen" }),
            ]))
            .mount(&server)
            .await;

        let mut seen = Vec::new();
        api(&server)
            .watch_notifications(|message| {
                let stop = matches!(message, PushMessage::Notification { .. });
                seen.push(message);
                !stop
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], PushMessage::Connected { .. }));
        match &seen[1] {
            PushMessage::Notification { data } => assert_eq!(data.title, "High CPU Usage"),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_rejected_by_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analyze/stream"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut outcome = Outcome::default();
        let request = evolv_gateway::impact::AnalysisRequest::at(10.0, 10.0);
        let session = api(&server).analyze_stream(&request, &mut outcome).await;

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(outcome.error.as_deref(), Some("API request failed: 500"));
    }

    #[tokio::test]
    async fn test_stream_transport_failure() {
        let client = ApiClient::new("http://127.0.0.1:9", &RequestConfig::default()).unwrap();
        let mut outcome = Outcome::default();
        let request = evolv_gateway::impact::AnalysisRequest::at(10.0, 10.0);

        let session = client.analyze_stream(&request, &mut outcome).await;
        assert_eq!(session.state(), SessionState::Failed);
        assert!(outcome.error.is_some());
    }
}

#[cfg(test)]
mod controller_tests {
    use super::*;

    async fn disk_store(dir: &tempfile::TempDir) -> Arc<SqliteStateStore> {
        let config = StateConfig {
            path: dir.path().join("state").join("client_state.db"),
            max_connections: 1,
        };
        Arc::new(SqliteStateStore::new(&config).await.unwrap())
    }

    #[tokio::test]
    async fn test_selection_survives_reload() {
        let server = MockServer::start().await;
        let dir = tempdir().unwrap();
        let store = disk_store(&dir).await;

        let mut controller = AppController::load(api(&server), store.clone()).await.unwrap();
        assert!(controller.cache_info().is_none());
        assert_ok!(controller.select_location(36.17, -115.14).await);
        assert_ok!(controller.select_preset(DataCenterTier::Large).await);

        let reloaded = AppController::load(api(&server), store).await.unwrap();
        let info = reloaded.cache_info().unwrap();
        assert_eq!(info.location.lat, 36.17);
        assert_eq!(info.config.preset, Some(DataCenterTier::Large));
        assert_eq!(
            reloaded.analysis_request().unwrap().size.as_deref(),
            Some("large")
        );
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_rejected() {
        let server = MockServer::start().await;
        let dir = tempdir().unwrap();
        let mut controller = AppController::load(api(&server), disk_store(&dir).await)
            .await
            .unwrap();

        let result = controller.select_location(120.0, 0.0).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));

        let mut spec = DataCenterTier::Small.spec();
        spec.power_mw = 0.0;
        let result = controller.set_custom_config(spec).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));

        let mut outcome = Outcome::default();
        let result = controller.analyze_impact(&mut outcome).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_analyze_impact_saves_report_and_reset_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analyze/stream"))
            .and(body_partial_json(json!({ "custom": true, "power_mw": 4.0 })))
            .respond_with(sse(&[
                json!({ "step": "initializing" }),
                json!({ "status": "analysis_chunk", "text": "Low risk." }),
                json!({ "status": "complete", "report": { "analysis": "Low risk." } }),
            ]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = disk_store(&dir).await;
        let mut controller = AppController::load(api(&server), store.clone()).await.unwrap();
        controller.select_location(45.5, -122.6).await.unwrap();
        controller
            .set_custom_config(DataCenterSpec {
                name: "Campus".to_string(),
                power_mw: 4.0,
                servers: 400,
                square_feet: 20_000,
                water_gallons_per_day: 72_000,
                employees: 20,
            })
            .await
            .unwrap();

        let mut outcome = Outcome::default();
        let session = controller.analyze_impact(&mut outcome).await.unwrap();
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.accumulated_text(), "Low risk.");

        let saved = store.load().await.unwrap();
        assert_eq!(saved.last_analysis, Some(json!({ "analysis": "Low risk." })));

        controller.reset().await.unwrap();
        assert!(controller.state().location.is_none());
        assert!(store.load().await.unwrap().location.is_none());
    }

    #[tokio::test]
    async fn test_forecast_settings_flow_into_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/forecast/stream"))
            .and(body_partial_json(json!({
                "years": 30, "scenario": "conservative", "initial_size_mw": 50.0
            })))
            .respond_with(sse(&[json!({ "status": "complete", "report": { "frames": [] } })]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let mut controller = AppController::load(api(&server), disk_store(&dir).await)
            .await
            .unwrap();
        controller.select_location(33.4, -112.0).await.unwrap();
        controller.set_forecast_years(30);
        controller.set_forecast_scenario(Scenario::Conservative);
        controller.set_forecast_size(DataCenterTier::Large);

        let mut outcome = Outcome::default();
        let session = controller.run_forecast(&mut outcome).await.unwrap();
        assert_eq!(session.state(), SessionState::Completed);

        controller.reset_forecast();
        assert_eq!(controller.forecast_settings().years, 5);
    }
}
