//! Demo endpoints — static/synthetic data for add-in development.
//!
//! None of this touches a backend; the add-in UI uses these to render
//! without a mailbox or a document store attached.

use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ListEmailsParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

async fn list_emails(Query(params): Query<ListEmailsParams>) -> impl IntoResponse {
    let emails: Vec<serde_json::Value> = (1..=params.limit)
        .map(|i| {
            serde_json::json!({
                "id": format!("demo-{i}"),
                "subject": format!("Demo subject {i}"),
                "snippet": "This is a demo message body snippet.",
            })
        })
        .collect();
    Json(serde_json::json!({ "emails": emails }))
}

async fn user_details() -> impl IntoResponse {
    Json(serde_json::json!({
        "display_name": "Demo User",
        "email": "demo.user@example.com",
        "tenant": "local",
    }))
}

async fn list_sharepoint_files() -> impl IntoResponse {
    Json(serde_json::json!({
        "sites": [
            {"id": "site-1", "name": "Legal", "drives": [
                {"id": "drive-1", "name": "Documents", "children": [
                    {"id": "doc-1", "name": "Contract_v1.docx", "type": "file"},
                    {"id": "folder-1", "name": "Case-1234", "type": "folder", "children": [
                        {"id": "doc-2", "name": "Summary.pdf", "type": "file"}
                    ]}
                ]}
            ]}
        ]
    }))
}

/// Build the demo routes.
pub fn routes() -> Router {
    Router::new()
        .route("/test/list_emails", get(list_emails))
        .route("/test/user_details", get(user_details))
        .route("/api/v1/list_demo_sharepoint_files", post(list_sharepoint_files))
}
