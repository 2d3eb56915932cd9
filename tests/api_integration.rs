//! Integration tests for the add-in HTTP API.
//!
//! Each test spins up the real router on a random port and exercises the
//! HTTP/SSE contract with a plain reqwest client. All processing goes
//! through the mock provider so no network or credentials are involved.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use mail_assist::api;
use mail_assist::config::AppConfig;
use mail_assist::llm::GenerationResult;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the API server on a random port, return its base URL.
async fn start_server() -> String {
    let app = api::router(Arc::new(AppConfig::default()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

/// One parsed server-sent event.
#[derive(Debug)]
struct SseEvent {
    name: String,
    data: Value,
}

/// Parse a complete text/event-stream body into events.
fn parse_sse(body: &str) -> Vec<SseEvent> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut name = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event: ") {
                    name = v.to_string();
                } else if let Some(v) = line.strip_prefix("data: ") {
                    data = v.to_string();
                }
            }
            SseEvent {
                name,
                data: serde_json::from_str(&data).expect("event data must be JSON"),
            }
        })
        .collect()
}

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["app"], "mail-assist");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn one_shot_processing_with_mock_provider() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/v1/process_email_for_addin"))
            .json(&json!({
                "email_id": "e-7",
                "subject": "Kickoff",
                "body": "Hi,\n- review the brief\n- send feedback by Monday\nThanks!",
                "recipients": ["team@example.com"],
                "provider": "mock"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let result: GenerationResult = resp.json().await.unwrap();
        assert_eq!(result.summary, "Summary of: Kickoff");
        assert_eq!(
            result.action_items,
            vec!["review the brief", "send feedback by Monday"]
        );
        assert!(result.draft_reply_html.contains("<strong>Kickoff</strong>"));
        assert!(result.citations.is_empty());
        assert_eq!(result.debug["provider"], "mock");
        assert_eq!(result.debug["email_id"], "e-7");
        assert!(result.debug["processing_time"].is_number());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn missing_required_fields_are_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        for (uri, body) in [
            ("/api/v1/process_email_for_addin", json!({"body": "no subject"})),
            ("/api/v1/process_email_for_addin", json!({"subject": "no body"})),
            ("/api/v1/process_email_for_addin_stream", json!({"subject": "no body"})),
        ] {
            let resp = client
                .post(format!("{base}{uri}"))
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 422, "{uri} accepted {body}");

            let json: Value = resp.json().await.unwrap();
            assert!(json["error"].as_str().unwrap().contains("Invalid request body"));
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unconfigured_hosted_provider_is_unavailable() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/v1/process_email_for_addin"))
            .json(&json!({"subject": "s", "body": "b", "provider": "groq"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);

        let json: Value = resp.json().await.unwrap();
        assert!(json["error"].as_str().unwrap().contains("GROQ_API_KEY"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn stream_emits_well_formed_event_sequence() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/v1/process_email_for_addin_stream"))
            .json(&json!({
                "subject": "Launch",
                "body": "- finalize the checklist",
                "provider": "mock"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        // Consume the event stream chunk by chunk; the mock stream is
        // finite, so the body terminates on its own.
        let mut body = String::new();
        let mut chunks = resp.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            body.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
        }
        let events = parse_sse(&body);

        assert!(events.len() >= 4, "expected status/tokens/final/status, got {events:?}");
        assert_eq!(events.first().unwrap().name, "status_update");
        assert_eq!(events.last().unwrap().name, "status_update");

        // Opening status announces the resolved provider.
        assert_eq!(events[0].data["message"], "initialising LLM agent");
        assert_eq!(events[0].data["provider"], "mock");

        // Token events each carry one fragment.
        let tokens: Vec<&SseEvent> = events.iter().filter(|e| e.name == "token").collect();
        assert!(!tokens.is_empty());
        let streamed: String = tokens
            .iter()
            .map(|e| e.data["content"].as_str().unwrap())
            .collect();
        assert!(streamed.contains("your email about Launch."));

        // Exactly one final event, carrying a complete GenerationResult.
        let finals: Vec<&SseEvent> = events.iter().filter(|e| e.name == "final").collect();
        assert_eq!(finals.len(), 1);
        let result: GenerationResult = serde_json::from_value(finals[0].data.clone()).unwrap();
        assert_eq!(result.summary, "Summary of: Launch");
        assert_eq!(result.action_items, vec!["finalize the checklist"]);

        // The final comes after every token and before the closing status.
        let final_idx = events.iter().position(|e| e.name == "final").unwrap();
        let last_token_idx = events.iter().rposition(|e| e.name == "token").unwrap();
        assert!(last_token_idx < final_idx);
        assert_eq!(final_idx, events.len() - 2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn demo_endpoints_serve_synthetic_data() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let json: Value = reqwest::get(format!("{base}/test/list_emails?limit=3"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["emails"].as_array().unwrap().len(), 3);
        assert_eq!(json["emails"][0]["id"], "demo-1");

        let json: Value = reqwest::get(format!("{base}/test/user_details"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["email"], "demo.user@example.com");

        let json: Value = client
            .post(format!("{base}/api/v1/list_demo_sharepoint_files"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["sites"][0]["name"], "Legal");
    })
    .await
    .unwrap();
}
