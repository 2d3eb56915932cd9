//! Gemini backend — Google's generative language API over reqwest.
//!
//! One-shot calls go through `generateContent`; streaming uses
//! `streamGenerateContent` with SSE framing. The raw model output is pushed
//! through the normalizer, so a model that ignores the JSON-only
//! instruction still produces a usable result.

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

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Hosted Gemini backend.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiClient {
    /// Construct the backend. Fails with [`LlmError::Unavailable`] when the
    /// credential is absent — the caller never gets a half-configured client.
    pub fn new(settings: &ProviderSettings, model_override: Option<&str>) -> Result<Self, LlmError> {
        let api_key = settings.api_key.clone().ok_or_else(|| LlmError::Unavailable {
            provider: "gemini".to_string(),
            reason: "GEMINI_API_KEY is not set".to_string(),
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
                provider: "gemini".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, api_key, model })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{GEMINI_API_BASE}/models/{}:{method}?key={}",
            self.model,
            self.api_key.expose_secret()
        )
    }

    fn request_body(prompt: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
        }
    }

    /// One-shot completion returning the raw model text.
    async fn complete_text(&self, prompt: String) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.api_url("generateContent"))
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "gemini".to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: "gemini".to_string(),
                reason: format!("upstream returned {status}: {body}"),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: "gemini".to_string(),
                reason: e.to_string(),
            })?;

        let text = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: "gemini".to_string(),
                reason: "no candidates in response".to_string(),
            });
        }
        Ok(text)
    }

    /// Degraded streaming path: re-tokenize the one-shot draft with markup
    /// stripped. Best-effort — a second failure here ends the stream early.
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
                warn!(provider = "gemini", error = %e, "Streaming fallback generation failed");
            }
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
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
            .insert("provider".to_string(), Value::String("gemini".to_string()));
        result
            .debug
            .insert("model".to_string(), Value::String(self.model.clone()));
        Ok(result)
    }

    async fn stream(&self, email: &EmailInput, documents: &[ContextDocument]) -> TokenStream {
        let prompt = build_prompt(email, documents);
        let url = format!("{}&alt=sse", self.api_url("streamGenerateContent"));

        let (tx, rx) = mpsc::channel::<String>(32);
        let this = self.clone();
        let email = email.clone();
        let documents = documents.to_vec();

        tokio::spawn(async move {
            let response = match this
                .client
                .post(&url)
                .json(&GeminiClient::request_body(prompt))
                .send()
                .await
            {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    warn!(provider = "gemini", status = %r.status(), "Live stream rejected, degrading");
                    this.send_fallback_tokens(&email, &documents, &tx).await;
                    return;
                }
                Err(e) => {
                    warn!(provider = "gemini", error = %e, "Live stream failed to open, degrading");
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
                        warn!(provider = "gemini", error = %e, "Live stream broke mid-flight, degrading");
                        this.send_fallback_tokens(&email, &documents, &tx).await;
                        return;
                    }
                };

                for payload in sse.push(&chunk) {
                    let Ok(parsed) = serde_json::from_str::<GenerateContentResponse>(&payload)
                    else {
                        continue;
                    };
                    let Some(candidate) = parsed.candidates.first() else {
                        continue;
                    };
                    for part in &candidate.content.parts {
                        for token in part.text.split_whitespace() {
                            // Receiver dropped means the client went away —
                            // stop producing and let the connection close.
                            if tx.send(format!("{token} ")).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

// ── Gemini API wire types ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
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
        let err = GeminiClient::new(&settings(None, None), None).unwrap_err();
        match err {
            LlmError::Unavailable { provider, reason } => {
                assert_eq!(provider, "gemini");
                assert!(reason.contains("GEMINI_API_KEY"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn model_resolution_precedence() {
        // Request override wins.
        let client =
            GeminiClient::new(&settings(Some("k"), Some("env-model")), Some("req-model")).unwrap();
        assert_eq!(client.model_name(), Some("req-model"));

        // Env default next.
        let client = GeminiClient::new(&settings(Some("k"), Some("env-model")), None).unwrap();
        assert_eq!(client.model_name(), Some("env-model"));

        // Hardcoded default last; empty override is unset.
        let client = GeminiClient::new(&settings(Some("k"), None), Some("  ")).unwrap();
        assert_eq!(client.model_name(), Some(DEFAULT_MODEL));
    }

    #[test]
    fn streaming_response_chunks_parse() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"Hello there"}],"role":"model"}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "Hello there");
    }
}
