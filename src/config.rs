//! Environment-sourced configuration.
//!
//! Everything is optional except a parseable bind address: hosted provider
//! credentials may be absent (their backends then fail construction with a
//! typed error) and the provider default may be unset (resolution falls
//! through to credential sniffing, then the offline backend).

use std::net::SocketAddr;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default bind address for the HTTP server.
const DEFAULT_ADDR: &str = "0.0.0.0:8000";

/// Default CORS origins — the add-in dev hosts.
const DEFAULT_CORS_ORIGINS: [&str; 2] = ["https://localhost:3000", "http://localhost:3000"];

/// Settings for one hosted provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// API credential. `None` means the provider is unavailable.
    pub api_key: Option<SecretString>,
    /// Environment-level model override (request-level override wins).
    pub model: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default provider name (`LLM_PROVIDER`). Empty string is treated as unset.
    pub default_provider: Option<String>,
    pub gemini: ProviderSettings,
    pub groq: ProviderSettings,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env_nonempty("MAIL_ASSIST_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let bind_addr: SocketAddr =
            addr.parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                    key: "MAIL_ASSIST_ADDR".to_string(),
                    message: e.to_string(),
                })?;

        let cors_origins = match env_nonempty("MAIL_ASSIST_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            default_provider: env_nonempty("LLM_PROVIDER"),
            gemini: ProviderSettings {
                api_key: env_nonempty("GEMINI_API_KEY").map(SecretString::from),
                model: env_nonempty("GEMINI_MODEL"),
            },
            groq: ProviderSettings {
                api_key: env_nonempty("GROQ_API_KEY").map(SecretString::from),
                model: env_nonempty("GROQ_MODEL"),
            },
            bind_addr,
            cors_origins,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            gemini: ProviderSettings::default(),
            groq: ProviderSettings::default(),
            bind_addr: DEFAULT_ADDR.parse().expect("default addr parses"),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Read an environment variable, treating empty/whitespace values as unset.
fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
