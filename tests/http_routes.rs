//! Router tests against the in-process axum service

use std::fs;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use kaizen::collab::Collaborators;
use kaizen::collab::mock::{MockAgents, MockExecutor, MockMemory, MockSelfRepair, Reply};
use kaizen::config::Config;
use kaizen::pipeline::Orchestrator;
use kaizen::server::{AppState, router};
use tempfile::TempDir;
use tower::ServiceExt;

fn config_in(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = temp.path().join("data");
    config.storage.site_dir = temp.path().join("site");
    config
}

fn app_with(temp: &TempDir, agents: MockAgents, self_repair: MockSelfRepair) -> Router {
    let config = config_in(temp);
    let collab = Collaborators {
        agents: Arc::new(agents),
        memory: Arc::new(MockMemory::new()),
        executor: Arc::new(MockExecutor::default()),
        self_repair: Arc::new(self_repair),
    };
    let orchestrator = Arc::new(Orchestrator::new(&config, collab).unwrap());
    router(AppState::new(orchestrator), &config.storage.site_dir)
}

fn app(temp: &TempDir) -> Router {
    app_with(temp, MockAgents::new(), MockSelfRepair::new())
}

async fn send(app: Router, method: &str, uri: &str, body: Body) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), "GET", "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_status_reports_idle() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), "GET", "/status", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "idle");
    assert_eq!(json["ordinal"], 0);
}

#[tokio::test]
async fn test_cron_loop_starts() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), "POST", "/cron/loop", Body::empty()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, "Loop started.");
}

#[tokio::test]
async fn test_cron_loop_while_running() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("data")).unwrap();
    fs::write(
        temp.path().join("data").join("system_state.json"),
        r#"{"status":"running","loopId":42,"ordinal":1}"#,
    )
    .unwrap();

    let (status, body) = send(app(&temp), "POST", "/cron/loop", Body::empty()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, "Loop already running.");
}

#[tokio::test]
async fn test_strategize_writes_mission() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(app(&temp), "POST", "/cron/strategize", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Strategist run complete.");

    let mission = fs::read_to_string(temp.path().join("data").join("current_mission.md")).unwrap();
    assert_eq!(mission, "Keep the dashboard fast.");
}

#[tokio::test]
async fn test_strategize_failure_is_500() {
    let temp = TempDir::new().unwrap();
    let agents = MockAgents::new().with_mission(Reply::ParseError);
    let app = app_with(&temp, agents, MockSelfRepair::new());

    let (status, _) = send(app, "POST", "/cron/strategize", Body::empty()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_system_agent_trigger() {
    let temp = TempDir::new().unwrap();
    let (status, body) = send(
        app(&temp),
        "POST",
        "/system-agent/trigger",
        Body::from(r#"{"reason":"disk full"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["diagnosis"], "looked into disk full");

    let (_, body) = send(app(&temp), "POST", "/system-agent/trigger", Body::empty()).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["diagnosis"], "looked into manual_trigger");
}

#[tokio::test]
async fn test_system_agent_failure() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, MockAgents::new(), MockSelfRepair::failing());

    let (status, body) = send(app, "POST", "/system-agent/trigger", Body::empty()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "System agent failed");
}

#[tokio::test]
async fn test_dashboard_served_as_fallback() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp);
    fs::write(temp.path().join("site").join("index.html"), "<h1>Kaizen</h1>").unwrap();

    let (status, body) = send(app.clone(), "GET", "/", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>Kaizen</h1>");

    let (status, _) = send(app, "GET", "/loops/missing.html", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
