//! Groq backend — OpenAI-compatible chat completions over reqwest.
//!
//! Same contract and degradation behavior as the Gemini backend; the wire
//! format differs (Bearer auth, `choices[].delta` streaming chunks with a
//! `[DONE]` sentinel).

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use super::normalize::normalize;
use super::prompt::build_prompt;
use super::sse::SseBuffer;
use super::{ContextDocument, EmailInput, GenerationResult, LlmClient, TokenStream, degraded_tokens};
use crate::config::ProviderSettings;
use crate::error::LlmError;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";

/// Low temperature keeps the JSON-only instruction sticky.
const TEMPERATURE: f32 = 0.2;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Hosted Groq backend.
#[derive(Clone, Debug)]
pub struct GroqClient {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GroqClient {
    /// Construct the backend. Fails with [`LlmError::Unavailable`] when the
    /// credential is absent.
    pub fn new(settings: &ProviderSettings, model_override: Option<&str>) -> Result<Self, LlmError> {
        let api_key = settings.api_key.clone().ok_or_else(|| LlmError::Unavailable {
            provider: "groq".to_string(),
            reason: "GROQ_API_KEY is not set".to_string(),
        })?;

        let model = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .or_else(|| settings.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Unavailable {
                provider: "groq".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, api_key, model })
    }

    fn request_body(&self, prompt: String, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a helpful assistant.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            stream,
        }
    }

    async fn complete_text(&self, prompt: String) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{GROQ_API_BASE}/chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(prompt, false))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "groq".to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: "groq".to_string(),
                reason: format!("upstream returned {status}: {body}"),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: "groq".to_string(),
            reason: e.to_string(),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "groq".to_string(),
                reason: "no choices in response".to_string(),
            })
    }

    async fn send_fallback_tokens(
        &self,
        email: &EmailInput,
        documents: &[ContextDocument],
        tx: &mpsc::Sender<String>,
    ) {
        match self.generate(email, documents).await {
            Ok(result) => {
                for token in degraded_tokens(&result) {
                    if tx.send(token).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(provider = "groq", error = %e, "Streaming fallback generation failed");
            }
        }
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    fn provider_name(&self) -> &'static str {
        "groq"
    }

    fn model_name(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn generate(
        &self,
        email: &EmailInput,
        documents: &[ContextDocument],
    ) -> Result<GenerationResult, LlmError> {
        let prompt = build_prompt(email, documents);
        let text = self.complete_text(prompt).await?;

        let mut result = normalize(&text);
        result
            .debug
            .insert("provider".to_string(), Value::String("groq".to_string()));
        result
            .debug
            .insert("model".to_string(), Value::String(self.model.clone()));
        Ok(result)
    }

    async fn stream(&self, email: &EmailInput, documents: &[ContextDocument]) -> TokenStream {
        let prompt = build_prompt(email, documents);

        let (tx, rx) = mpsc::channel::<String>(32);
        let this = self.clone();
        let email = email.clone();
        let documents = documents.to_vec();

        tokio::spawn(async move {
            let response = match this
                .client
                .post(format!("{GROQ_API_BASE}/chat/completions"))
                .bearer_auth(this.api_key.expose_secret())
                .json(&this.request_body(prompt, true))
                .send()
                .await
            {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    warn!(provider = "groq", status = %r.status(), "Live stream rejected, degrading");
                    this.send_fallback_tokens(&email, &documents, &tx).await;
                    return;
                }
                Err(e) => {
                    warn!(provider = "groq", error = %e, "Live stream failed to open, degrading");
                    this.send_fallback_tokens(&email, &documents, &tx).await;
                    return;
                }
            };

            let mut bytes = response.bytes_stream();
            let mut sse = SseBuffer::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(provider = "groq", error = %e, "Live stream broke mid-flight, degrading");
                        this.send_fallback_tokens(&email, &documents, &tx).await;
                        return;
                    }
                };

                for payload in sse.push(&chunk) {
                    if payload == "[DONE]" {
                        return;
                    }
                    let Ok(parsed) = serde_json::from_str::<ChatChunk>(&payload) else {
                        continue;
                    };
                    let Some(content) = parsed
                        .choices
                        .first()
                        .and_then(|c| c.delta.content.as_deref())
                    else {
                        continue;
                    };
                    for token in content.split_whitespace() {
                        if tx.send(format!("{token} ")).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

// ── Groq API wire types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: Option<&str>, model: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            api_key: key.map(SecretString::from),
            model: model.map(String::from),
        }
    }

    #[test]
    fn missing_credential_is_a_construction_failure() {
        let err = GroqClient::new(&settings(None, None), None).unwrap_err();
        match err {
            LlmError::Unavailable { provider, reason } => {
                assert_eq!(provider, "groq");
                assert!(reason.contains("GROQ_API_KEY"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn model_defaults_when_nothing_set() {
        let client = GroqClient::new(&settings(Some("k"), None), None).unwrap();
        assert_eq!(client.model_name(), Some(DEFAULT_MODEL));
    }

    #[test]
    fn delta_chunks_parse() {
        let payload = r#"{"choices":[{"delta":{"content":"Hi the"},"index":0}]}"#;
        let parsed: ChatChunk = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hi the"));

        // Terminal chunk carries no delta content.
        let payload = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: ChatChunk = serde_json::from_str(payload).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }
}
