use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::{JobKind, JobPatch, JobStatus};

/// External generative-media services the orchestrator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    ImageModel,
    VideoModelA,
    VideoModelB,
}

impl Provider {
    /// Provider name for display
    pub fn name(&self) -> &str {
        match self {
            Self::ImageModel => "GPT Image",
            Self::VideoModelA => "Kling",
            Self::VideoModelB => "Veo",
        }
    }

    /// Provider ID for API communication and job tagging
    pub fn id(&self) -> &'static str {
        match self {
            Self::ImageModel => "image-model",
            Self::VideoModelA => "video-model-a",
            Self::VideoModelB => "video-model-b",
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::ImageModel => JobKind::ImageGeneration,
            Self::VideoModelA | Self::VideoModelB => JobKind::VideoGeneration,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|p| p.id() == id)
    }

    /// All known providers
    pub fn all() -> [Provider; 3] {
        [Self::ImageModel, Self::VideoModelA, Self::VideoModelB]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Provider-issued reference used to poll a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderHandle {
    pub provider: Provider,
    pub id: String,
}

impl ProviderHandle {
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self { provider, id: id.into() }
    }
}

/// A provider's status report, already mapped onto the canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn pending() -> Self {
        Self { status: JobStatus::Pending, progress: Some(0), result_url: None, error: None }
    }

    pub fn processing(progress: Option<u8>) -> Self {
        Self { status: JobStatus::Processing, progress, result_url: None, error: None }
    }

    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: Some(100),
            result_url: Some(result_url.into()),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { status: JobStatus::Failed, progress: None, result_url: None, error: Some(message.into()) }
    }

    pub fn into_patch(self) -> JobPatch {
        JobPatch {
            status: Some(self.status),
            progress: self.progress,
            result_url: self.result_url,
            error_message: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_ids_round_trip() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_id(provider.id()), Some(provider));
        }
        assert_eq!(Provider::from_id("veo"), None);
    }

    #[test]
    fn test_provider_kinds() {
        assert_eq!(Provider::ImageModel.kind(), JobKind::ImageGeneration);
        assert_eq!(Provider::VideoModelA.kind(), JobKind::VideoGeneration);
        assert_eq!(Provider::VideoModelB.kind(), JobKind::VideoGeneration);
    }

    #[test]
    fn test_serde_uses_ids() {
        let json = serde_json::to_string(&Provider::VideoModelA).unwrap();
        assert_eq!(json, "\"video-model-a\"");
    }
}
