//! HTTP surface for the add-in.
//!
//! One router, three real endpoints (health, one-shot processing, SSE
//! streaming) plus the demo routes. Each processing request constructs a
//! fresh backend — no state is shared across requests beyond the immutable
//! configuration.

pub mod demo;
pub mod types;

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, LlmError};
use crate::llm::{GenerationResult, create_client, resolve_provider};
use crate::pipeline::{self, StreamEvent};
use types::ProcessEmailRequest;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

/// Build the application router, CORS included.
pub fn router(config: Arc<AppConfig>) -> Router {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let state = AppState { config };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/process_email_for_addin", post(process_email_for_addin))
        .route(
            "/api/v1/process_email_for_addin_stream",
            post(process_email_for_addin_stream),
        )
        .with_state(state)
        .merge(demo::routes())
        .layer(cors)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Llm(LlmError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Llm(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "app": "mail-assist",
    }))
}

/// One-shot processing: validate, select a backend, generate, respond.
///
/// Fails loud — a provider error here becomes a request failure.
async fn process_email_for_addin(
    State(state): State<AppState>,
    payload: Result<Json<ProcessEmailRequest>, JsonRejection>,
) -> Result<Json<GenerationResult>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let request_id = Uuid::new_v4();
    let provider = resolve_provider(request.provider.as_deref(), &state.config);
    let llm = create_client(provider, request.model_name.as_deref(), &state.config)?;

    info!(%request_id, provider = provider.as_str(), "Processing email");

    let email = request.to_email();
    let result = pipeline::process_email(llm.as_ref(), &email, request.enable_context)
        .await
        .inspect_err(|e| warn!(%request_id, error = %e, "Email processing failed"))?;

    Ok(Json(result))
}

/// Streaming processing: same selection logic, but the response is a
/// text/event-stream. Provider errors after this point never surface to the
/// client — the pipeline degrades instead (the stream must stay alive).
async fn process_email_for_addin_stream(
    State(state): State<AppState>,
    payload: Result<Json<ProcessEmailRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let request_id = Uuid::new_v4();
    let provider = resolve_provider(request.provider.as_deref(), &state.config);
    let llm = create_client(provider, request.model_name.as_deref(), &state.config)?;

    info!(%request_id, provider = provider.as_str(), "Processing email (streaming)");

    let email = request.to_email();
    let events = pipeline::stream_events(llm, email, request.enable_context)
        .map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(events))
}

/// Frame a pipeline event as `event: <name>` plus one JSON data line.
fn sse_event(event: &StreamEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.name()).data(data)
}
