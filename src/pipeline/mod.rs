//! Request-scoped email processing.
//!
//! Thin layer between the HTTP handlers and a generation backend: the
//! one-shot path stamps diagnostics onto the result, the streaming path
//! produces the event sequence the add-in consumes. Nothing here persists —
//! every entity lives for exactly one request.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::mock::offline_generation;
use crate::llm::{ContextDocument, EmailInput, GenerationResult, LlmClient};

/// One-shot processing: generate, then stamp diagnostics into `debug`.
///
/// `enable_context` is accepted for wire compatibility but retrieval is not
/// implemented — the document list is always empty.
pub async fn process_email(
    llm: &dyn LlmClient,
    email: &EmailInput,
    _enable_context: bool,
) -> Result<GenerationResult, LlmError> {
    let start = Instant::now();
    let documents: Vec<ContextDocument> = Vec::new();

    let mut result = llm.generate(email, &documents).await?;

    let elapsed = (start.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;
    result
        .debug
        .insert("processing_time".to_string(), Value::from(elapsed));
    if let Some(id) = &email.id {
        result
            .debug
            .insert("email_id".to_string(), Value::String(id.clone()));
    }
    Ok(result)
}

/// One event on the streaming path.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Status(StatusUpdate),
    Token { content: String },
    Final(GenerationResult),
}

/// Payload of a `status_update` event.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl StreamEvent {
    /// SSE event name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status_update",
            Self::Token { .. } => "token",
            Self::Final(_) => "final",
        }
    }
}

/// Produce the streaming event sequence:
/// one opening `status_update` (with the resolved provider/model), the
/// backend's token events, exactly one `final` carrying a complete
/// [`GenerationResult`], and a closing `status_update`.
///
/// The `final` result comes from an independent `generate` call, not from
/// folding the streamed tokens — for non-deterministic backends the two may
/// disagree, which mirrors the upstream contract. If that call fails, the
/// offline backend supplies a degraded final result instead of an error
/// event, so the stream always completes cleanly.
///
/// Events flow through a bounded channel; if the client disconnects the
/// receiver is dropped, sends start failing, and production stops.
pub fn stream_events(
    llm: Arc<dyn LlmClient>,
    email: EmailInput,
    _enable_context: bool,
) -> ReceiverStream<StreamEvent> {
    let (tx, rx) = mpsc::channel::<StreamEvent>(32);

    tokio::spawn(async move {
        let opening = StreamEvent::Status(StatusUpdate {
            message: "initialising LLM agent".to_string(),
            provider: Some(llm.provider_name().to_string()),
            model: llm.model_name().map(String::from),
        });
        if tx.send(opening).await.is_err() {
            return;
        }

        let documents: Vec<ContextDocument> = Vec::new();
        let mut tokens = llm.stream(&email, &documents).await;
        while let Some(content) = tokens.next().await {
            if tx.send(StreamEvent::Token { content }).await.is_err() {
                return;
            }
        }
        drop(tokens);

        let final_result = match llm.generate(&email, &documents).await {
            Ok(result) => result,
            Err(e) => {
                warn!(provider = llm.provider_name(), error = %e,
                    "Final generation failed, serving offline result");
                let mut result = offline_generation(&email);
                result.debug.insert("degraded".to_string(), Value::Bool(true));
                result
                    .debug
                    .insert("error".to_string(), Value::String(e.to_string()));
                result
            }
        };
        if tx.send(StreamEvent::Final(final_result)).await.is_err() {
            return;
        }

        let closing = StreamEvent::Status(StatusUpdate {
            message: "done".to_string(),
            provider: None,
            model: None,
        });
        let _ = tx.send(closing).await;
    });

    ReceiverStream::new(rx)
}
