#![cfg(unix)]

mod common;

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{fake_toolchain, wait_terminal};
use forge_core::model::{TaskFamily, TaskId, TaskStatus};
use forge_daemon::auth::TokenAuthenticator;
use forge_daemon::build_orchestrator;
use forge_daemon::config::DaemonConfig;
use forge_daemon::http::{router, AppState};
use forge_daemon::orchestrator::Orchestrator;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const TOKEN: &str = "test-token";

struct Harness {
    app: Router,
    orchestrator: Arc<Orchestrator>,
}

fn harness(dir: &Path, tokens: Vec<String>) -> Harness {
    let config = DaemonConfig {
        toolchain: fake_toolchain(dir),
        work_root: dir.join("work"),
        exec_timeout_seconds: 30,
        ..DaemonConfig::default()
    };
    let orchestrator = Arc::new(build_orchestrator(&config));
    let auth = Arc::new(TokenAuthenticator::new(tokens));
    let state = AppState::new(Arc::clone(&orchestrator), auth, config);
    Harness {
        app: router(state),
        orchestrator,
    }
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn root_and_health_need_no_token() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "forge-daemon");
    assert_eq!(body["endpoints"]["generate"], "/api/v1/generate");

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    // node is `sh` here; its version check may or may not succeed.
    assert!(body["status"] == "healthy" || body["status"] == "degraded");
    assert_eq!(body["cliPresent"], true);
    assert_eq!(body["activeTasks"]["generations"], 0);
}

#[tokio::test]
async fn health_is_degraded_without_node() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DaemonConfig {
        toolchain: fake_toolchain(dir.path()),
        work_root: dir.path().join("work"),
        ..DaemonConfig::default()
    };
    config.toolchain.node = dir.path().join("no-such-node").display().to_string();
    let orchestrator = Arc::new(build_orchestrator(&config));
    let app = router(AppState::new(orchestrator, Arc::new(TokenAuthenticator::default()), config));

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["node"]["available"], false);
    assert_eq!(body["node"]["version"], Value::Null);
}

#[tokio::test]
async fn api_rejects_missing_bearer() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), Vec::new());

    let req = Request::builder().uri("/api/v1/metrics").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing bearer token");
    assert_eq!(body["status_code"], 401);
    assert!(body["timestamp"].as_u64().is_some());
}

#[tokio::test]
async fn api_rejects_token_outside_allowlist() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec!["only-this".into()]);

    let (status, body) = send(&h.app, request(Method::GET, "/api/v1/metrics", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid authentication credentials");
}

#[tokio::test]
async fn unknown_task_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let (status, body) = send(&h.app, request(Method::GET, "/api/v1/generate/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status_code"], 404);
}

#[tokio::test]
async fn malformed_and_invalid_bodies_are_400() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let (status, _) = send(&h.app, request(Method::POST, "/api/v1/analyze", Some(json!({"wrong": 1})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({
        "config": {
            "packageName": "demo-lib",
            "description": "demo",
            "packageType": "library",
            "qualityLevel": "good"
        },
        "idea": "short"
    });
    let (status, body) = send(&h.app, request(Method::POST, "/api/v1/generate", Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
    assert_eq!(h.orchestrator.stores().counts().generations, 0);
}

#[tokio::test]
async fn analyze_missing_path_creates_no_task() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);
    let missing = dir.path().join("absent").display().to_string();

    let (status, _) = send(
        &h.app,
        request(Method::POST, "/api/v1/analyze", Some(json!({"packagePath": missing}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.orchestrator.stores().counts().analyses, 0);
}

#[tokio::test]
async fn analyze_is_accepted_and_pollable() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);
    let package = dir.path().join("pkg");
    std::fs::create_dir_all(&package).unwrap();

    let (status, accepted) = send(
        &h.app,
        request(
            Method::POST,
            "/api/v1/analyze",
            Some(json!({"packagePath": package.display().to_string(), "analysisType": "security"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["family"], "analysis");
    let task_id = accepted["taskId"].as_str().unwrap().to_string();
    let status_url = accepted["statusUrl"].as_str().unwrap().to_string();
    assert_eq!(status_url, format!("/api/v1/analyze/{task_id}"));

    let record = wait_terminal(&h.orchestrator, TaskFamily::Analysis, &TaskId::from(task_id.as_str())).await;
    assert_eq!(record.status, TaskStatus::Completed);

    let (status, body) = send(&h.app, request(Method::GET, &status_url, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100);
    assert_eq!(body["result"]["analysisType"], "security");
    assert_eq!(body["result"]["report"]["score"], 88);
}

#[tokio::test]
async fn generate_reports_package_path() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);
    let out = dir.path().join("out");

    let body = json!({
        "config": {
            "packageName": "demo-lib",
            "description": "A demo library",
            "packageType": "library",
            "qualityLevel": "good",
            "outputDir": out.display().to_string()
        }
    });
    let (status, accepted) = send(&h.app, request(Method::POST, "/api/v1/generate", Some(body))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["packagePath"], out.join("demo-lib").display().to_string());

    let id = TaskId::from(accepted["taskId"].as_str().unwrap());
    let record = wait_terminal(&h.orchestrator, TaskFamily::Generation, &id).await;
    assert_eq!(record.status, TaskStatus::Completed, "{:?}", record.error);
    assert!(out.join("demo-lib/package.json").exists());
}

#[tokio::test]
async fn unknown_preset_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let (status, body) = send(
        &h.app,
        request(Method::POST, "/api/v1/generate/from-template/angular-app", Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "template angular-app not found");
}

#[tokio::test]
async fn submissions_after_shutdown_are_503() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);
    h.orchestrator.shutdown();

    let body = json!({
        "config": {
            "packageName": "demo-lib",
            "description": "A demo library",
            "packageType": "library",
            "qualityLevel": "good",
            "outputDir": dir.path().join("out").display().to_string()
        }
    });
    let (status, body) = send(&h.app, request(Method::POST, "/api/v1/generate", Some(body))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status_code"], 503);
    assert_eq!(h.orchestrator.stores().counts().generations, 0);
}

#[tokio::test]
async fn cleanup_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let (status, metrics) = send(&h.app, request(Method::GET, "/api/v1/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["tasks"]["analyses"]["total"], 0);

    let (status, report) = send(&h.app, request(Method::DELETE, "/api/v1/cleanup", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["success"], true);
    assert_eq!(report["cleaned"]["generations"], 0);
}

#[tokio::test]
async fn optimize_runs_inline() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let body = json!({
        "packagePath": dir.path().display().to_string(),
        "optimizationType": "bundle"
    });
    let (status, body) = send(&h.app, request(Method::POST, "/api/v1/optimize", Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["improvements"], json!(["tree-shaking"]));
    assert_eq!(body["metrics"]["sizeAfter"], 80);
}

#[tokio::test]
async fn templates_list_and_render() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let (status, body) = send(&h.app, request(Method::GET, "/api/v1/templates", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["templates"][0]["id"], "typescript-library");

    let out = dir.path().join("rendered");
    let req_body = json!({"config": {"name": "x"}, "outputDir": out.display().to_string()});
    let (status, body) = send(
        &h.app,
        request(Method::POST, "/api/v1/templates/typescript-library", Some(req_body)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["templateId"], "typescript-library");
    assert_eq!(body["files"], json!([out.join("README.md").display().to_string()]));

    let req_body = json!({"config": {}, "outputDir": out.display().to_string()});
    let (status, body) = send(&h.app, request(Method::POST, "/api/v1/templates/--list", Some(req_body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
}

#[tokio::test]
async fn ultrathink_returns_solutions() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![TOKEN.into()]);

    let body = json!({"idea": "a command line tool for dates"});
    let (status, body) = send(&h.app, request(Method::POST, "/api/v1/ultrathink", Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["solutions"][0]["title"], "cli");
    assert_eq!(body["insights"], json!(["small"]));
}
