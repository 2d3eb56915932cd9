//! Generation backends for email processing.
//!
//! Supports:
//! - **Mock**: deterministic offline backend, no external calls
//! - **Gemini**: Google's generative language API
//! - **Groq**: OpenAI-compatible chat completions API
//!
//! All variants implement [`LlmClient`] — a one-shot `generate` call plus a
//! token-producing `stream` call. Backends are selected per request by name
//! via [`resolve_provider`] and constructed fresh by [`create_client`].

pub mod gemini;
pub mod groq;
pub mod mock;
pub mod normalize;
pub mod prompt;
pub(crate) mod sse;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use mock::MockClient;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::LlmError;

/// The email under processing. Immutable input to generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailInput {
    /// Client-side identifier, echoed into `debug` when present.
    pub id: Option<String>,
    pub subject: String,
    /// Plain text or HTML.
    pub body: String,
    pub recipients: Vec<String>,
}

impl EmailInput {
    /// Subject line, or a placeholder when empty.
    pub fn subject_or_default(&self) -> &str {
        if self.subject.is_empty() {
            "(no subject)"
        } else {
            &self.subject
        }
    }
}

/// A retrieval result intended to ground generation.
///
/// No code path populates these yet — the pipeline always passes an empty
/// slice — but the backend contract accepts them so retrieval can be added
/// without touching the providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDocument {
    pub title: String,
    pub snippet: String,
}

/// Structured output of a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub summary: String,
    pub action_items: Vec<String>,
    pub draft_reply_html: String,
    /// Opaque citation records. Always empty today.
    #[serde(default)]
    pub citations: Vec<serde_json::Value>,
    /// Diagnostic fields (provider, model, timings). Not part of the contract.
    #[serde(default)]
    pub debug: serde_json::Map<String, serde_json::Value>,
}

/// A finite, non-restartable sequence of text fragments.
///
/// Concatenated, the fragments approximate (but need not equal) the draft
/// content of an equivalent `generate` call. Dropping the stream cancels
/// production and releases any underlying connection.
pub type TokenStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Capability shared by all generation backends.
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Provider name for logging and `debug` fields.
    fn provider_name(&self) -> &'static str;

    /// Resolved model name, if the backend has one.
    fn model_name(&self) -> Option<&str>;

    /// One-shot generation.
    async fn generate(
        &self,
        email: &EmailInput,
        documents: &[ContextDocument],
    ) -> Result<GenerationResult, LlmError>;

    /// Incremental token stream.
    ///
    /// Hosted backends never surface upstream errors here: a failed live
    /// stream degrades to re-tokenizing the one-shot draft (§ the fallback
    /// in each hosted impl).
    async fn stream(&self, email: &EmailInput, documents: &[ContextDocument]) -> TokenStream;
}

/// Known generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Mock,
    Gemini,
    Groq,
}

impl Provider {
    /// Parse a provider name. Matching is case-insensitive; Gemini answers
    /// to its historical aliases. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "gemini" | "google" | "googleai" => Some(Self::Gemini),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Gemini => "gemini",
            Self::Groq => "groq",
        }
    }
}

/// Resolve which provider handles a request.
///
/// Precedence: explicit request field → `LLM_PROVIDER` default → a hosted
/// provider whose credential is present (Gemini wins the tiebreak) → mock.
/// Empty strings are treated as unset at every tier, and unrecognized names
/// fall back to the offline backend rather than erroring.
pub fn resolve_provider(requested: Option<&str>, config: &AppConfig) -> Provider {
    if let Some(name) = requested.map(str::trim).filter(|n| !n.is_empty()) {
        return Provider::parse(name).unwrap_or(Provider::Mock);
    }
    if let Some(name) = config.default_provider.as_deref() {
        return Provider::parse(name).unwrap_or(Provider::Mock);
    }
    if config.gemini.api_key.is_some() {
        return Provider::Gemini;
    }
    if config.groq.api_key.is_some() {
        return Provider::Groq;
    }
    Provider::Mock
}

/// Construct a backend for the given provider.
///
/// Hosted backends fail here with [`LlmError::Unavailable`] when their
/// credential is absent — never at call time.
pub fn create_client(
    provider: Provider,
    model_override: Option<&str>,
    config: &AppConfig,
) -> Result<Arc<dyn LlmClient>, LlmError> {
    match provider {
        Provider::Mock => Ok(Arc::new(MockClient::new())),
        Provider::Gemini => Ok(Arc::new(GeminiClient::new(&config.gemini, model_override)?)),
        Provider::Groq => Ok(Arc::new(GroqClient::new(&config.groq, model_override)?)),
    }
}

/// Tokenize a one-shot result's draft for the degraded streaming path:
/// markup stripped, then whitespace-split with the trailing space the
/// add-in's renderer expects on every fragment.
pub(crate) fn degraded_tokens(result: &GenerationResult) -> Vec<String> {
    normalize::strip_tags(&result.draft_reply_html)
        .split_whitespace()
        .map(|t| format!("{t} "))
        .collect()
}
