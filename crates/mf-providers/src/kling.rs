//! Video-model-a: image-to-video over a signed-token REST API whose task ids
//! are long decimal numerals.

use async_trait::async_trait;
use log::{info, warn};
use mf_core::{Error, ImageSource, JobInputs, Provider, ProviderHandle, ProviderStatus, Result};
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderAdapter;
use crate::http::decode_response;
use crate::signer::CredentialSigner;

pub const DEFAULT_BASE_URL: &str = "https://api-singapore.klingai.com/v1";
pub const DEFAULT_DURATION_SECS: u32 = 5;
/// Reported while the provider is working but gives no numeric progress.
pub const ESTIMATED_PROGRESS: u8 = 50;

const PROVIDER: Provider = Provider::VideoModelA;

#[derive(Debug, Clone)]
pub struct KlingConfig {
    pub access_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub model: String,
}

impl KlingConfig {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "kling-v1".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Image2VideoRequest<'a> {
    model: &'a str,
    image: &'a str,
    prompt: &'a str,
    duration: String,
    aspect_ratio: &'a str,
    cfg_scale: f32,
    mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// The provider reports failures with a non-zero `code`, often under HTTP 200.
    fn into_data(self) -> Result<T> {
        if self.code != 0 {
            let message = self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Unknown error (code {})", self.code));
            return Err(Error::rejected(PROVIDER, message));
        }
        self.data
            .ok_or_else(|| Error::rejected(PROVIDER, "response did not contain task data"))
    }
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    task_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TaskData {
    pub task_status: String,
    #[serde(default)]
    pub task_status_msg: Option<String>,
    #[serde(default)]
    pub task_result: Option<TaskResult>,
    #[serde(default)]
    pub works: Option<Vec<Artifact>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TaskResult {
    #[serde(default)]
    pub videos: Vec<Artifact>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Artifact {
    #[serde(default)]
    pub url: Option<String>,
}

impl TaskData {
    fn first_artifact(&self) -> Option<String> {
        let from_result = self.task_result.as_ref().and_then(|r| r.videos.first());
        let from_works = self.works.as_ref().and_then(|w| w.first());
        from_result
            .or(from_works)
            .and_then(|a| a.url.clone())
            .filter(|url| !url.is_empty())
    }

    /// Native status vocabulary to the canonical one.
    pub(crate) fn into_status(self, task_id: &str) -> ProviderStatus {
        match self.task_status.as_str() {
            "submitted" => ProviderStatus::pending(),
            "processing" => ProviderStatus::processing(Some(ESTIMATED_PROGRESS)),
            "succeed" => match self.first_artifact() {
                Some(url) => ProviderStatus::completed(url),
                None => ProviderStatus::failed("Video generation finished without a video URL"),
            },
            "failed" => ProviderStatus::failed(
                self.task_status_msg
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Video generation failed".to_string()),
            ),
            other => {
                warn!("Unknown task status '{other}' for task {task_id}, treating as processing");
                ProviderStatus::processing(None)
            }
        }
    }
}

#[derive(Debug)]
pub struct KlingAdapter {
    client: reqwest::Client,
    signer: CredentialSigner,
    base_url: String,
    model: String,
}

impl KlingAdapter {
    /// Fails fast with `Configuration` when key material is missing.
    pub fn new(client: reqwest::Client, config: KlingConfig) -> Result<Self> {
        let signer = CredentialSigner::new(&config.access_key, &config.secret_key)?;
        Ok(Self {
            client,
            signer,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
        })
    }
}

#[async_trait]
impl ProviderAdapter for KlingAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn submit(&self, inputs: &JobInputs) -> Result<ProviderHandle> {
        let image_url = inputs.image_url.as_deref().ok_or_else(|| Error::required("imageUrl"))?;
        if inputs.prompt.trim().is_empty() {
            return Err(Error::required("prompt"));
        }
        // This provider wants the bare base64 payload, not a data URL.
        let image = ImageSource::parse(image_url)?.as_bare_payload();

        let body = Image2VideoRequest {
            model: &self.model,
            image,
            prompt: &inputs.prompt,
            duration: inputs.duration.unwrap_or(DEFAULT_DURATION_SECS).to_string(),
            aspect_ratio: "16:9",
            cfg_scale: 0.5,
            mode: "std",
        };

        let context = "submitting image2video task";
        let response = self
            .client
            .post(format!("{}/videos/image2video", self.base_url))
            .bearer_auth(self.signer.sign()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transport(context, e))?;

        let envelope: Envelope<SubmitData> = decode_response(Some(PROVIDER), context, response).await?;
        let data = envelope.into_data()?;
        info!("Submitted {} task {}", PROVIDER, data.task_id);

        Ok(ProviderHandle::new(PROVIDER, data.task_id))
    }

    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderStatus> {
        let context = format!("checking image2video task {}", handle.id);
        let response = self
            .client
            .get(format!("{}/videos/image2video/{}", self.base_url, handle.id))
            .bearer_auth(self.signer.sign()?)
            .send()
            .await
            .map_err(|e| Error::transport(&context, e))?;

        let envelope: Envelope<TaskData> = decode_response(Some(PROVIDER), &context, response).await?;
        Ok(envelope.into_data()?.into_status(&handle.id))
    }
}
