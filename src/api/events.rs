//! Event ingress and state endpoints

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;
use crate::gate::GateSnapshot;
use crate::router::{SpeechEvent, WireEvent};

/// Response for accepted events
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: &'static str,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult = Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)>;

async fn enqueue(state: &ApiState, event: SpeechEvent) -> ApiResult {
    let kind = event.kind();
    match state.events.send(event).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(AcceptedResponse { accepted: kind }),
        )),
        Err(e) => {
            tracing::warn!(event = kind, error = %e, "event rejected");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

/// Current gate state
async fn get_state(State(state): State<ApiState>) -> Json<GateSnapshot> {
    Json(state.snapshots.borrow().clone())
}

/// Submit one speech event
async fn post_event(State(state): State<ApiState>, Json(event): Json<WireEvent>) -> ApiResult {
    enqueue(&state, event.into()).await
}

/// Manual wake trigger (button press)
async fn post_wake(State(state): State<ApiState>) -> ApiResult {
    enqueue(&state, SpeechEvent::Wakeup).await
}

/// Drop any pending command
async fn post_reset(State(state): State<ApiState>) -> ApiResult {
    enqueue(&state, SpeechEvent::Reset).await
}

/// Build event router
#[must_use]
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/events", post(post_event))
        .route("/wake", post(post_wake))
        .route("/reset", post(post_reset))
        .with_state(state)
}
