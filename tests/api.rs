//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tower::ServiceExt;
use voice_gate::api::{ApiState, router};
use voice_gate::config::GateConfig;
use voice_gate::daemon;
use voice_gate::{Gate, GateSnapshot, SpeechEvent};

/// Build a test API router and the receiving end of its event channel
fn build_test_router() -> (axum::Router, mpsc::Receiver<SpeechEvent>) {
    let (events, rx) = daemon::channel(8);
    let gate = Gate::new(&GateConfig::default());
    let (_tx, snapshots) = watch::channel(gate.snapshot(Instant::now()));

    (router(ApiState { events, snapshots }), rx)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _rx) = build_test_router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_state_endpoint() {
    let (app, _rx) = build_test_router();

    let response = app
        .oneshot(Request::builder().uri("/v1/state").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["state"], "idle");
    assert!(json.get("pending_intent").is_none());
}

#[tokio::test]
async fn test_state_endpoint_reflects_snapshot() {
    let (events, _rx) = daemon::channel(8);
    let (tx, snapshots) = watch::channel(GateSnapshot {
        state: voice_gate::ConversationState::Idle,
        pending_intent: None,
        expires_in_ms: None,
    });
    let app = router(ApiState { events, snapshots });

    tx.send_replace(GateSnapshot {
        state: voice_gate::ConversationState::WaitingForUserConfirmation,
        pending_intent: Some("home".to_string()),
        expires_in_ms: Some(12_000),
    });

    let response = app
        .oneshot(Request::builder().uri("/v1/state").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["state"], "waiting_for_user_confirmation");
    assert_eq!(json["pending_intent"], "home");
    assert_eq!(json["expires_in_ms"], 12_000);
}

#[tokio::test]
async fn test_wake_endpoint_enqueues_wakeup() {
    let (app, mut rx) = build_test_router();

    let response = app.oneshot(post("/v1/wake", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await["accepted"], "wakeup");

    assert_eq!(rx.try_recv().unwrap(), SpeechEvent::Wakeup);
}

#[tokio::test]
async fn test_reset_endpoint_enqueues_reset() {
    let (app, mut rx) = build_test_router();

    let response = app.oneshot(post("/v1/reset", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(rx.try_recv().unwrap(), SpeechEvent::Reset);
}

#[tokio::test]
async fn test_events_endpoint() {
    let (app, mut rx) = build_test_router();

    let response = app
        .clone()
        .oneshot(post(
            "/v1/events",
            r#"{"type":"final_transcript","text":"yes please"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .oneshot(post(
            "/v1/events",
            r#"{"type":"agent_reply_chunk","data":{"needs_confirmation":true,"command":"lock_door"}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    assert_eq!(
        rx.try_recv().unwrap(),
        SpeechEvent::FinalTranscript("yes please".to_string())
    );
    let Ok(SpeechEvent::AgentReplyChunk(raw)) = rx.try_recv() else {
        panic!("expected reply chunk");
    };
    let reply = voice_gate::intent::parse(&raw).unwrap();
    assert_eq!(reply.command.as_deref(), Some("lock_door"));
}

#[tokio::test]
async fn test_events_endpoint_rejects_unknown_event() {
    let (app, mut rx) = build_test_router();

    let response = app
        .oneshot(post("/v1/events", r#"{"type":"shout","text":"hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_events_endpoint_when_loop_stopped() {
    let (app, rx) = build_test_router();
    drop(rx);

    let response = app.oneshot(post("/v1/wake", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(response).await["error"].is_string());
}
