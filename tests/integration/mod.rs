//! Integration tests for the agent API, worker and web page.
//!
//! Each test serves the routers on an ephemeral local port and talks to them
//! over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;

use climsys_agent::api::{create_router, AppState};
use climsys_agent::store::Store;
use climsys_agent::web::create_web_router;
use climsys_agent::worker::{spawn_supervised, DemoAnalyzer, Worker, WorkerConfig};

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Serve the API with a fast-polling worker. Drop the sender to stop it.
async fn spawn_api() -> (String, watch::Sender<bool>) {
    let store = Arc::new(Store::new());
    let worker = Worker::new(
        store.clone(),
        DemoAnalyzer,
        WorkerConfig {
            worker_id: "it-worker".to_string(),
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
        },
    );
    let (tx, rx) = watch::channel(false);
    spawn_supervised(worker, rx);

    let addr = serve(create_router(AppState::new(store, 3))).await;
    (format!("http://{}", addr), tx)
}

#[tokio::test]
async fn test_health() {
    let (base, _shutdown) = spawn_api().await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"ok": true}));
}

#[tokio::test]
async fn test_run_is_processed_by_worker() {
    let (base, _shutdown) = spawn_api().await;
    let client = reqwest::Client::new();

    let upsert: Value = client
        .post(format!("{}/v1/assets:bulk_upsert", base))
        .json(&json!({"assets": [{"external_id": "port-1", "lat": -41.28, "lon": 174.78}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(upsert, json!({"upserted": 1}));

    let created: Value = client
        .post(format!("{}/v1/runs", base))
        .json(&json!({"name": "portfolio", "parameters": {"percentile": 50}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["status"], json!("queued"));
    let run_id = created["run_id"].as_str().unwrap().to_string();

    let mut status = Value::Null;
    for _ in 0..200 {
        let run: Value = client
            .get(format!("{}/v1/runs/{}", base, run_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        status = run["status"].clone();
        if status == json!("done") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, json!("done"));

    let evidence: Value = client
        .get(format!("{}/v1/evidence?run_id={}", base, run_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = evidence.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], json!("generated"));
    assert_eq!(items[0]["content"]["dataset_version"], json!("demo_v1"));
}

#[tokio::test]
async fn test_unknown_run_is_404() {
    let (base, _shutdown) = spawn_api().await;

    let response = reqwest::get(format!("{}/v1/runs/run_0", base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_web_page_links_to_api_health() {
    let addr = serve(create_web_router("http://api.internal:8000")).await;

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert!(response.status().is_success());
    let html = response.text().await.unwrap();
    assert!(html.contains("http://api.internal:8000"));
    assert!(html.contains(r#"href="http://api.internal:8000/health""#));
}
