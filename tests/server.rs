//! HTTP API tests against a server bound to a free port.

use std::sync::Arc;

use async_trait::async_trait;
use flight_harness::config::Config;
use flight_harness::context::PromptContext;
use flight_harness::harness::Harness;
use flight_harness::reasoning::{DisabledEngine, ReasoningEngine};
use flight_harness::server::run_server_with;
use flight_harness_core::Message;
use serde_json::Value;

struct EchoEngine;

#[async_trait]
impl ReasoningEngine for EchoEngine {
    fn name(&self) -> &str {
        "echo"
    }

    async fn answer(
        &self,
        history: &[Message],
        context: &PromptContext,
        _instructions: Option<&str>,
    ) -> anyhow::Result<String> {
        let last = history.last().map(|m| m.content.as_str()).unwrap_or("");
        let total = context
            .summary
            .as_ref()
            .map(|s| s.total_messages)
            .unwrap_or(0);
        Ok(format!("echo: {} ({} records)", last, total))
    }
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/api/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start(engine: Arc<dyn ReasoningEngine>) -> String {
    let port = find_free_port();
    let harness = Harness::with_engine(&Config::minimal(), engine);
    let bind = format!("127.0.0.1:{}", port);
    tokio::spawn(async move {
        run_server_with(harness, &bind).await.ok();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

const LOG: &str = concat!(
    r#"{"timestamp": 1.0, "message_type": "GPS_RAW_INT", "data": {"fix_type": 3, "alt": 100000}}"#,
    "\n",
    r#"{"timestamp": 2.0, "message_type": "STATUSTEXT", "data": {"severity": 4, "text": "EKF variance"}}"#,
    "\n",
);

async fn upload(client: &reqwest::Client, base: &str, filename: &str, body: &str) -> Value {
    let resp = client
        .post(format!("{}/api/upload", base))
        .query(&[("filename", filename)])
        .header("content-type", "application/x-ndjson")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_and_root() {
    let base = start(Arc::new(EchoEngine)).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{}/api/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let root: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(root["message"], "Flight Harness API");
}

#[tokio::test]
async fn test_upload_summary_and_chat() {
    let base = start(Arc::new(EchoEngine)).await;
    let client = reqwest::Client::new();

    let uploaded = upload(&client, &base, "flight.jsonl", LOG).await;
    assert_eq!(uploaded["parsed_messages"], 2);
    let file_id = uploaded["file_id"].as_str().unwrap().to_string();
    assert!(!file_id.is_empty());

    let resp = client
        .get(format!("{}/api/telemetry/summary/{}", base, file_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["summary"]["total_messages"], 2);
    assert_eq!(body["summary"]["time_range"]["duration"], 1.0);
    assert_eq!(body["anomaly_summary"]["status"], "ok");
    assert_eq!(body["anomaly_summary"]["counts"]["high_severity_errors"], 1);
    assert_eq!(body["anomaly_summary"]["examples"][0]["type"], "status_error");

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&serde_json::json!({"question": "any errors?", "file_id": file_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(answer["answer"], "echo: any errors? (2 records)");
    assert_eq!(answer["confidence"], 0.8);
    assert_eq!(answer["sources"][0], format!("Flight log: {}", file_id));

    let conversation_id = answer["conversation_id"].as_str().unwrap();
    let conv: Value = client
        .get(format!("{}/api/conversations/{}", base, conversation_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conv["messages"].as_array().unwrap().len(), 2);
    assert_eq!(conv["messages"][0]["role"], "user");

    let resp = client
        .delete(format!("{}/api/conversations/{}", base, conversation_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let base = start(Arc::new(EchoEngine)).await;
    let client = reqwest::Client::new();

    for (method, path) in [
        ("GET", "/api/telemetry/summary/nope"),
        ("DELETE", "/api/logs/nope"),
        ("GET", "/api/conversations/nope"),
        ("DELETE", "/api/conversations/nope"),
    ] {
        let url = format!("{}{}", base, path);
        let req = match method {
            "GET" => client.get(&url),
            _ => client.delete(&url),
        };
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), 404, "{} {}", method, path);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "not_found");
    }
}

#[tokio::test]
async fn test_delete_log_then_summary_is_gone() {
    let base = start(Arc::new(EchoEngine)).await;
    let client = reqwest::Client::new();
    let uploaded = upload(&client, &base, "flight.ndjson", LOG).await;
    let file_id = uploaded["file_id"].as_str().unwrap();

    let summary_url = format!("{}/api/telemetry/summary/{}", base, file_id);
    assert_eq!(client.get(&summary_url).send().await.unwrap().status(), 200);

    let resp = client
        .delete(format!("{}/api/logs/{}", base, file_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(client.get(&summary_url).send().await.unwrap().status(), 404);
}

#[tokio::test]
async fn test_rejected_upload_and_missing_filename() {
    let base = start(Arc::new(EchoEngine)).await;
    let client = reqwest::Client::new();

    let rejected = upload(&client, &base, "flight.bin", LOG).await;
    assert_eq!(rejected["file_id"], "");
    assert!(rejected["parsed_messages"].is_null());

    let resp = client
        .post(format!("{}/api/upload", base))
        .body(LOG)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_engine_failure_maps_to_bad_gateway() {
    let base = start(Arc::new(DisabledEngine)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&serde_json::json!({"question": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "upstream_error");

    // Blank questions never reach the engine.
    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&serde_json::json!({"question": " "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Please enter a valid question.");
    assert_eq!(body["confidence"], 0.0);
}
