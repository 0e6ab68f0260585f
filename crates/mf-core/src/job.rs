use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::Provider;

/// Used when a provider reports failure without saying why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Job failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ImageGeneration,
    VideoGeneration,
}

impl JobKind {
    pub fn id(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "image-generation",
            Self::VideoGeneration => "video-generation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a job may move from `self` to `next`.
    ///
    /// Staying put is allowed while active; terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

/// Provider-specific request payload as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInputs {
    pub prompt: String,
    /// Source image: a remote URL, a data URL or a bare base64 payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Requested video length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl JobInputs {
    pub fn image(prompt: impl Into<String>, size: Option<String>) -> Self {
        Self { prompt: prompt.into(), size, ..Default::default() }
    }

    pub fn video(image_url: impl Into<String>, prompt: impl Into<String>, duration: Option<u32>) -> Self {
        Self {
            prompt: prompt.into(),
            image_url: Some(image_url.into()),
            duration,
            ..Default::default()
        }
    }
}

/// Partial update produced by a poll. `None` fields leave the job untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

impl JobPatch {
    pub fn failed(message: impl Into<String>) -> Self {
        Self { status: Some(JobStatus::Failed), error_message: Some(message.into()), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.progress.is_none() && self.result_url.is_none() && self.error_message.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub provider: Provider,
    pub status: JobStatus,
    pub input_params: JobInputs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Parent row in the external record store, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every applied change; used for optimistic updates.
    pub version: u64,
}

impl Job {
    pub fn new(id: impl Into<String>, provider: Provider, input_params: JobInputs) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind: provider.kind(),
            provider,
            status: JobStatus::Pending,
            input_params,
            progress: Some(0),
            result_url: None,
            error_message: None,
            row_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// A job whose submission was refused; it is born terminal.
    pub fn failed_submission(
        id: impl Into<String>,
        provider: Provider,
        input_params: JobInputs,
        message: impl Into<String>,
    ) -> Self {
        let mut job = Self::new(id, provider, input_params);
        job.status = JobStatus::Failed;
        job.progress = None;
        job.error_message = Some(message.into());
        job
    }

    pub fn with_row(mut self, row_id: Option<String>) -> Self {
        self.row_id = row_id;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge a patch into the job, enforcing forward-only transitions.
    ///
    /// Returns `Ok(false)` when nothing changed, which includes late reports
    /// that repeat the terminal status of an already finished job.
    pub fn apply(&mut self, patch: JobPatch) -> Result<bool> {
        let next = patch.status.unwrap_or(self.status);

        if self.status.is_terminal() {
            if next == self.status {
                return Ok(false);
            }
            return Err(self.invalid_transition(next));
        }
        if !self.status.can_transition_to(next) {
            return Err(self.invalid_transition(next));
        }

        let before = (self.status, self.progress, self.result_url.clone(), self.error_message.clone());

        match next {
            JobStatus::Completed => {
                let url = patch.result_url.or_else(|| self.result_url.take()).ok_or_else(|| {
                    Error::validation(format!("job {} reported completion without an artifact", self.id))
                })?;
                self.result_url = Some(url);
                self.error_message = None;
                self.progress = Some(100);
            }
            JobStatus::Failed => {
                let message = patch
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                self.error_message = Some(message);
                self.result_url = None;
                if let Some(progress) = patch.progress {
                    self.progress = Some(progress.min(100));
                }
            }
            JobStatus::Pending | JobStatus::Processing => {
                if let Some(progress) = patch.progress {
                    self.progress = Some(progress.min(100));
                }
            }
        }
        self.status = next;

        let after = (self.status, self.progress, self.result_url.clone(), self.error_message.clone());
        if before == after {
            return Ok(false);
        }
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(true)
    }

    fn invalid_transition(&self, next: JobStatus) -> Error {
        Error::InvalidTransition {
            id: self.id.clone(),
            from: self.status.as_str().to_string(),
            to: next.as_str().to_string(),
        }
    }
}
