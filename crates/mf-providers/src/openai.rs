use log::info;
use mf_core::{Error, Provider, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::decode_response;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const SUPPORTED_IMAGE_SIZES: [&str; 3] = ["1024x1024", "1792x1024", "1024x1792"];

const PROVIDER: Provider = Provider::ImageModel;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub image_model: String,
    pub vision_model: String,
    pub chat_model: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: "gpt-image-1".to_string(),
            vision_model: "gpt-4-vision-preview".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
        }
    }
}

/// Check a requested size against the sizes the image model supports.
pub fn validate_size(size: Option<&str>) -> Result<&str> {
    match size.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_IMAGE_SIZE),
        Some(size) if SUPPORTED_IMAGE_SIZES.contains(&size) => Ok(size),
        Some(size) => Err(Error::validation(format!(
            "size must be one of {}, got {size}",
            SUPPORTED_IMAGE_SIZES.join(", ")
        ))),
    }
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Value,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Authenticated client for the image and chat completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, mut config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Configuration("OpenAI API key not configured".into()));
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Generate one image. Returns a remote URL, or a PNG data URL when the
    /// model answers with inline base64.
    pub async fn generate_image(&self, prompt: &str, size: Option<&str>) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::required("prompt"));
        }
        let size = validate_size(size)?;

        let context = "generating image";
        let response = self
            .client
            .post(format!("{}/images/generations", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&ImageGenerationRequest { model: &self.config.image_model, prompt, n: 1, size })
            .send()
            .await
            .map_err(|e| Error::transport(context, e))?;

        let body: ImageGenerationResponse = decode_response(Some(PROVIDER), context, response).await?;
        let first = body.data.into_iter().next();
        let url = match first {
            Some(ImageData { url: Some(url), .. }) if !url.is_empty() => url,
            Some(ImageData { b64_json: Some(b64), .. }) if !b64.is_empty() => format!("data:image/png;base64,{b64}"),
            _ => return Err(Error::rejected(PROVIDER, "No image data in response")),
        };
        info!("Generated image for prompt of {} chars", prompt.len());
        Ok(url)
    }

    /// Run a chat completion and return the first choice's text.
    pub async fn chat(&self, model: &str, messages: &[ChatMessage], max_tokens: u32, temperature: f32) -> Result<String> {
        let context = "requesting chat completion";
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&ChatRequest { model, messages, max_tokens, temperature })
            .send()
            .await
            .map_err(|e| Error::transport(context, e))?;

        let body: ChatResponse = decode_response(Some(PROVIDER), context, response).await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::rejected(PROVIDER, "No content in completion response"))
    }
}
