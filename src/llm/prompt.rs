//! Prompt construction for hosted providers.

use super::normalize::truncate_chars;
use super::{ContextDocument, EmailInput};

/// How much of each context snippet makes it into the prompt.
const SNIPPET_LIMIT: usize = 200;

/// Build the single prompt string sent to every hosted provider.
///
/// The provider is instructed to answer with ONLY a JSON object matching
/// the generation schema; the normalizer cleans up whatever it actually
/// returns.
pub fn build_prompt(email: &EmailInput, documents: &[ContextDocument]) -> String {
    let doc_snippets = documents
        .iter()
        .map(|d| format!("- {}: {}", d.title, truncate_chars(&d.snippet, SNIPPET_LIMIT)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an assistant that processes an email and returns a strict JSON object. \
         Respond with ONLY valid JSON, no code fences. Schema: {{\n\
         \x20 \"summary\": string,\n\
         \x20 \"action_items\": string[],\n\
         \x20 \"draft_reply_html\": string\n\
         }}\n\n\
         Email subject: {subject}\n\
         Email body (HTML or text):\n{body}\n\n\
         Context documents (optional):\n{docs}\n\n\
         Rules: concise summary; 2-6 action items; draft_reply_html must be valid HTML; JSON only.",
        subject = email.subject_or_default(),
        body = email.body,
        docs = if doc_snippets.is_empty() {
            "(none)"
        } else {
            &doc_snippets
        },
    )
}
