use mf_core::{Error, JobInputs, JobKind, JobStatus, ProviderStatus, Result};
use serde::{Deserialize, Serialize};

/// Required string field: absent and blank are the same mistake.
fn require(value: Option<String>, field: &str) -> Result<String> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| Error::required(field))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: Option<String>,
    pub size: Option<String>,
}

impl GenerateImageRequest {
    pub fn prompt(&self) -> Result<String> {
        require(self.prompt.clone(), "prompt")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_url: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageRequest {
    pub image_url: Option<String>,
}

impl AnalyzeImageRequest {
    pub fn image_url(self) -> Result<String> {
        require(self.image_url, "imageUrl")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YamlToPromptRequest {
    pub yaml: Option<String>,
}

impl YamlToPromptRequest {
    pub fn yaml(self) -> Result<String> {
        require(self.yaml, "yaml")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub prompt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    pub image_url: Option<String>,
    pub prompt: Option<String>,
    pub duration: Option<u32>,
}

impl GenerateVideoRequest {
    pub fn into_inputs(self) -> Result<JobInputs> {
        let image_url = require(self.image_url, "imageUrl")?;
        let prompt = require(self.prompt, "prompt")?;
        Ok(JobInputs::video(image_url, prompt, self.duration))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    pub task_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub task_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoStatusResponse {
    pub fn new(task_id: String, status: ProviderStatus) -> Self {
        Self {
            task_id,
            status: status.status,
            progress: status.progress,
            video_url: status.result_url,
            error: status.error,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub row_id: Option<String>,
    pub video_url: Option<String>,
}

impl FinalizeRequest {
    pub fn into_parts(self) -> Result<(String, String)> {
        Ok((require(self.row_id, "rowId")?, require(self.video_url, "videoUrl")?))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreateRequest {
    pub kind: Option<JobKind>,
    pub prompt: Option<String>,
    pub image_url: Option<String>,
    pub size: Option<String>,
    pub duration: Option<u32>,
    pub row_id: Option<String>,
}

impl JobCreateRequest {
    pub fn into_parts(self) -> Result<(JobKind, JobInputs, Option<String>)> {
        let kind = self.kind.ok_or_else(|| Error::required("kind"))?;
        let inputs = JobInputs {
            prompt: self.prompt.unwrap_or_default(),
            image_url: self.image_url,
            size: self.size,
            duration: self.duration,
        };
        Ok((kind, inputs, self.row_id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebuildRequest {
    pub prompt: Option<String>,
}

impl RebuildRequest {
    pub fn prompt(self) -> Result<String> {
        require(self.prompt, "prompt")
    }
}

/// Attempts used by the bounded wait when the caller gives none.
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 40;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitQuery {
    pub max_attempts: Option<u32>,
}

impl WaitQuery {
    pub fn max_attempts(&self) -> Result<u32> {
        match self.max_attempts {
            Some(0) => Err(Error::validation("maxAttempts must be at least 1")),
            Some(n) => Ok(n),
            None => Ok(DEFAULT_WAIT_ATTEMPTS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopWatchResponse {
    pub id: String,
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearCompletedResponse {
    pub cleared: usize,
}
