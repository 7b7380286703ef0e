//! Process configuration.
//!
//! All options come from environment variables. A `.env` file in the working
//! directory is loaded first when present (local development only).

use std::time::Duration;

use anyhow::{Context, Result};

/// Default chat-completions endpoint for code generation.
pub const DEFAULT_LLM_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Default model used for code generation.
pub const DEFAULT_LLM_MODEL: &str = "google/gemini-2.0-flash-001";
/// Default GitHub REST API base.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Generation service settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Hosting (GitHub) settings.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    /// Account that owns generated repositories; also used to build the Pages URL.
    pub username: String,
    pub api_url: String,
    /// Wait after provisioning so the Pages URL has a chance to resolve.
    pub settle_delay: Duration,
}

/// Callback delivery settings.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Shared secret every submission must carry.
    pub secret: String,
    pub llm: LlmConfig,
    pub github: GitHubConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Required: `LLM_API_KEY` (or `OPENROUTER_API_KEY`), `GITHUB_TOKEN`,
    /// `GITHUB_USERNAME`, `SECRET`.
    pub fn from_env() -> Result<Self> {
        if std::path::Path::new(".env").exists() {
            match dotenvy::dotenv() {
                Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
                Err(e) => tracing::warn!("Failed to load .env: {}", e),
            }
        }

        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .context("LLM_API_KEY (or OPENROUTER_API_KEY) must be set")?;

        let llm = LlmConfig {
            api_key,
            api_url: env_or("LLM_API_URL", DEFAULT_LLM_API_URL),
            model: env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 120)?),
        };

        let github = GitHubConfig {
            token: required("GITHUB_TOKEN")?,
            username: required("GITHUB_USERNAME")?,
            api_url: env_or("GITHUB_API_URL", DEFAULT_GITHUB_API_URL)
                .trim_end_matches('/')
                .to_string(),
            settle_delay: Duration::from_secs(parse_env("PAGES_SETTLE_SECS", 30)?),
        };

        let max_attempts: u32 = parse_env("DELIVERY_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            anyhow::bail!("DELIVERY_MAX_ATTEMPTS must be at least 1");
        }
        let delivery = DeliveryConfig {
            max_attempts,
            base_delay: Duration::from_millis(parse_env("DELIVERY_BASE_DELAY_MS", 1000)?),
        };

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 5000)?,
            secret: required("SECRET")?,
            llm,
            github,
            delivery,
        })
    }
}

fn required(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{} must be set", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", name);
    }
    Ok(value)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        _ => Ok(default),
    }
}
