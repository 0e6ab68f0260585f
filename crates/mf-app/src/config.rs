use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use mf_providers::{KlingConfig, OpenAiConfig, kling, openai, record_store};

use crate::generator::registry::ProviderSettings;
use crate::generator::scheduler::PollSettings;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub providers: ProviderSettings,
    pub polling: PollSettings,
}

impl AppConfig {
    /// Load from the process environment, after an optional `.env` file.
    pub fn load() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {e}"),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let string = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let mut openai = OpenAiConfig::new(string("OPENAI_API_KEY", ""));
        openai.base_url = string("OPENAI_BASE_URL", openai::DEFAULT_BASE_URL);
        openai.image_model = string("OPENAI_IMAGE_MODEL", &openai.image_model);
        openai.vision_model = string("OPENAI_VISION_MODEL", &openai.vision_model);
        openai.chat_model = string("OPENAI_CHAT_MODEL", &openai.chat_model);

        let mut kling = KlingConfig::new(string("KLING_ACCESS_KEY", ""), string("KLING_SECRET_KEY", ""));
        kling.base_url = string("KLING_BASE_URL", kling::DEFAULT_BASE_URL);

        let backend_token = Some(string("BACKEND_API_TOKEN", "")).filter(|t| !t.is_empty());

        Ok(Self {
            port: parse(&lookup, "PORT", 3000)?,
            providers: ProviderSettings {
                openai,
                kling,
                backend_url: string("BACKEND_API_URL", record_store::DEFAULT_BASE_URL),
                backend_token,
                rows_cache_ttl: Duration::from_secs(parse(&lookup, "ROWS_CACHE_TTL_SECS", 30)?),
                http_timeout: Duration::from_secs(parse(&lookup, "HTTP_TIMEOUT_SECS", 30)?),
            },
            polling: PollSettings {
                image_interval: Duration::from_millis(parse(&lookup, "IMAGE_POLL_INTERVAL_MS", 2000)?),
                video_interval: Duration::from_millis(parse(&lookup, "VIDEO_POLL_INTERVAL_MS", 3000)?),
                max_poll_errors: parse(&lookup, "MAX_POLL_ERRORS", 5)?,
            },
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}
