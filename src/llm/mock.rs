//! Deterministic offline backend for local development.
//!
//! No external calls. Action items come from a line-oriented heuristic over
//! the body; the summary and draft are templates. The stream variant paces
//! a canned sentence word by word so client-side rendering has something to
//! animate.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};

use super::{ContextDocument, EmailInput, GenerationResult, LlmClient, TokenStream};
use crate::error::LlmError;

/// Per-token delay on the canned stream.
const TOKEN_PACING: Duration = Duration::from_millis(30);

/// Imperative-sentence heuristic cutoff.
const MAX_IMPERATIVE_LEN: usize = 120;

/// How many action items the draft list shows.
const MAX_DRAFT_ITEMS: usize = 5;

const DEFAULT_ACTION_ITEMS: [&str; 2] = [
    "Review the email content and confirm next steps.",
    "Reply with a brief acknowledgment and proposed timeline.",
];

/// Deterministic mock backend.
#[derive(Debug)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract action items from the body, one line at a time.
///
/// A line qualifies if it carries a bullet marker, or if it reads like a
/// short imperative sentence (ends with a period, starts uppercase, at most
/// 120 characters). Falls back to two fixed items when nothing qualifies.
fn extract_action_items(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ") {
            let stripped = line
                .trim_start_matches(|c| c == '-' || c == '*' || c == '•' || c == ' ')
                .trim();
            items.push(stripped.to_string());
        } else if line.ends_with('.')
            && line.chars().next().is_some_and(|c| c.is_uppercase())
            && line.chars().count() <= MAX_IMPERATIVE_LEN
        {
            items.push(line.to_string());
        }
    }

    if items.is_empty() {
        items = DEFAULT_ACTION_ITEMS.iter().map(|s| s.to_string()).collect();
    }
    items
}

/// The full offline generation, factored out of the trait impl because it
/// cannot fail: the streaming pipeline also uses it as the degraded final
/// result when a hosted one-shot call errors out.
pub(crate) fn offline_generation(email: &EmailInput) -> GenerationResult {
    let subject = email.subject_or_default();
    let action_items = extract_action_items(email.body.trim());

    let mut debug = Map::new();
    debug.insert("provider".to_string(), Value::String("mock".to_string()));

    GenerationResult {
        summary: format!("Summary of: {subject}"),
        draft_reply_html: build_draft(subject, &action_items),
        action_items,
        citations: Vec::new(),
        debug,
    }
}

fn build_draft(subject: &str, action_items: &[String]) -> String {
    let items_html: String = action_items
        .iter()
        .take(MAX_DRAFT_ITEMS)
        .map(|item| format!("<li>{item}</li>"))
        .collect();

    format!(
        "<p>Hi,</p>\n\
         <p>Thanks for your email regarding <strong>{subject}</strong>. \
         Here's a quick recap and next steps:</p>\n\
         <ul>{items_html}</ul>\n\
         <p>Best regards,<br/>Mail Assist</p>"
    )
}

#[async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> Option<&str> {
        None
    }

    async fn generate(
        &self,
        email: &EmailInput,
        _documents: &[ContextDocument],
    ) -> Result<GenerationResult, LlmError> {
        Ok(offline_generation(email))
    }

    async fn stream(&self, email: &EmailInput, _documents: &[ContextDocument]) -> TokenStream {
        let text = format!(
            "Hi, Thanks for your email about {}. \
             I'll follow up shortly with next steps. Best, Mail Assist",
            email.subject_or_default()
        );
        let tokens: Vec<String> = text.split_whitespace().map(|t| format!("{t} ")).collect();

        Box::pin(futures::stream::iter(tokens).then(|token| async move {
            tokio::time::sleep(TOKEN_PACING).await;
            token
        }))
    }
}
