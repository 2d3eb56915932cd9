use std::sync::Arc;

use anyhow::Context;

use mail_assist::api;
use mail_assist::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(AppConfig::from_env().context("Failed to load configuration")?);

    eprintln!("📬 Mail Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}", config.bind_addr);
    eprintln!(
        "   Default provider: {}",
        config.default_provider.as_deref().unwrap_or("(resolved per request)")
    );
    eprintln!(
        "   Gemini: {}   Groq: {}",
        if config.gemini.api_key.is_some() { "configured" } else { "no credential" },
        if config.groq.api_key.is_some() { "configured" } else { "no credential" },
    );

    let app = api::router(Arc::clone(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "Mail Assist API started");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
