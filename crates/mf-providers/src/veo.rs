//! Video-model-b: reached through the record-store backend, which already
//! speaks the canonical status vocabulary and issues opaque job ids.

use async_trait::async_trait;
use log::info;
use mf_core::{Error, ImageSource, JobInputs, JobStatus, Provider, ProviderHandle, ProviderStatus, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderAdapter;
use crate::http::decode_response;
use crate::record_store::RecordStoreClient;

const PROVIDER: Provider = Provider::VideoModelB;

#[derive(Debug, Serialize)]
struct CreateVideoJob<'a> {
    image_url: &'a str,
    motion_text: &'a str,
    model: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VideoJobRecord {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl VideoJobRecord {
    pub(crate) fn into_status(self) -> ProviderStatus {
        match self.status {
            JobStatus::Pending => ProviderStatus { progress: self.progress.or(Some(0)), ..ProviderStatus::pending() },
            JobStatus::Processing => ProviderStatus::processing(self.progress),
            JobStatus::Completed => match self.video_url.filter(|url| !url.is_empty()) {
                Some(url) => ProviderStatus::completed(url),
                None => ProviderStatus::failed("Video generation finished without a video URL"),
            },
            JobStatus::Failed => ProviderStatus::failed(
                self.error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Video generation failed".to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VeoAdapter {
    backend: RecordStoreClient,
}

impl VeoAdapter {
    pub fn new(backend: RecordStoreClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ProviderAdapter for VeoAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn submit(&self, inputs: &JobInputs) -> Result<ProviderHandle> {
        let image_url = inputs.image_url.as_deref().ok_or_else(|| Error::required("imageUrl"))?;
        if inputs.prompt.trim().is_empty() {
            return Err(Error::required("prompt"));
        }
        // Validated only; this backend takes the reference exactly as given.
        ImageSource::parse(image_url)?;

        let context = "creating video job";
        let response = self
            .backend
            .request(Method::POST, "/video-jobs")
            .json(&CreateVideoJob { image_url: image_url.trim(), motion_text: &inputs.prompt, model: "veo" })
            .send()
            .await
            .map_err(|e| Error::transport(context, e))?;

        let record: VideoJobRecord = decode_response(Some(PROVIDER), context, response).await?;
        if record.status == JobStatus::Failed {
            let message = record.error.unwrap_or_else(|| "Video generation failed".to_string());
            return Err(Error::rejected(PROVIDER, message));
        }
        info!("Submitted {} job {}", PROVIDER, record.id);

        Ok(ProviderHandle::new(PROVIDER, record.id))
    }

    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderStatus> {
        let context = format!("checking video job {}", handle.id);
        let response = self
            .backend
            .request(Method::GET, &format!("/video-jobs/{}", handle.id))
            .send()
            .await
            .map_err(|e| Error::transport(&context, e))?;

        let record: VideoJobRecord = decode_response(Some(PROVIDER), &context, response).await?;
        Ok(record.into_status())
    }
}
