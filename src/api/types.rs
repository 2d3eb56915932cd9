//! Wire types for the add-in API.

use serde::Deserialize;

use crate::llm::EmailInput;

/// Body of both `process_email_for_addin` endpoints.
///
/// `subject` and `body` are required — a payload missing either is rejected
/// before any backend is selected. Everything else is optional;
/// empty-string `provider`/`model_name` values are treated as unset by the
/// resolution logic.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessEmailRequest {
    #[serde(default)]
    pub email_id: Option<String>,
    pub subject: String,
    /// HTML or plain text.
    pub body: String,
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    /// Accepted for wire compatibility; context retrieval is not implemented.
    #[serde(default)]
    pub enable_context: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl ProcessEmailRequest {
    pub fn to_email(&self) -> EmailInput {
        EmailInput {
            id: self.email_id.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            recipients: self.recipients.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_body_deserializes() {
        let req: ProcessEmailRequest =
            serde_json::from_str(r#"{"subject": "s", "body": "b"}"#).unwrap();
        assert_eq!(req.subject, "s");
        assert!(req.recipients.is_none());
        assert!(!req.enable_context);
        assert!(req.provider.is_none());

        let email = req.to_email();
        assert!(email.recipients.is_empty());
        assert!(email.id.is_none());
    }

    #[test]
    fn missing_subject_is_rejected() {
        let err = serde_json::from_str::<ProcessEmailRequest>(r#"{"body": "b"}"#).unwrap_err();
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn full_body_deserializes() {
        let raw = r#"{
            "email_id": "e-1",
            "subject": "s",
            "body": "b",
            "recipients": ["a@x.com"],
            "enable_context": true,
            "provider": "gemini",
            "model_name": "gemini-1.5-pro"
        }"#;
        let req: ProcessEmailRequest = serde_json::from_str(raw).unwrap();
        assert!(req.enable_context);
        assert_eq!(req.provider.as_deref(), Some("gemini"));
        assert_eq!(req.to_email().recipients, vec!["a@x.com"]);
    }
}
