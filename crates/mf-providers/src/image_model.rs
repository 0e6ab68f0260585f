//! Image-model adapter. The provider answers synchronously, so submission
//! starts the request in the background and `poll` reports its outcome.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use mf_core::{Error, JobInputs, Provider, ProviderHandle, ProviderStatus, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapter::ProviderAdapter;
use crate::openai::{OpenAiClient, validate_size};

const PROVIDER: Provider = Provider::ImageModel;

#[derive(Debug, Clone)]
pub struct ImageModelAdapter {
    openai: Arc<OpenAiClient>,
    outcomes: Arc<RwLock<HashMap<String, ProviderStatus>>>,
}

impl ImageModelAdapter {
    pub fn new(openai: Arc<OpenAiClient>) -> Self {
        Self { openai, outcomes: Arc::default() }
    }
}

#[async_trait]
impl ProviderAdapter for ImageModelAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn submit(&self, inputs: &JobInputs) -> Result<ProviderHandle> {
        if inputs.prompt.trim().is_empty() {
            return Err(Error::required("prompt"));
        }
        let size = validate_size(inputs.size.as_deref())?.to_string();

        let id = Uuid::new_v4().to_string();
        self.outcomes.write().await.insert(id.clone(), ProviderStatus::processing(None));

        let openai = self.openai.clone();
        let outcomes = self.outcomes.clone();
        let prompt = inputs.prompt.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            let outcome = match openai.generate_image(&prompt, Some(&size)).await {
                Ok(url) => {
                    info!("Image job {task_id} completed");
                    ProviderStatus::completed(url)
                }
                Err(e) => {
                    warn!("Image job {task_id} failed: {e}");
                    ProviderStatus::failed(e.user_message())
                }
            };
            outcomes.write().await.insert(task_id, outcome);
        });

        Ok(ProviderHandle::new(PROVIDER, id))
    }

    /// A terminal outcome is handed out once and then dropped.
    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderStatus> {
        let mut outcomes = self.outcomes.write().await;
        if let Some(status) = outcomes.get(&handle.id).filter(|s| !s.status.is_terminal()) {
            return Ok(status.clone());
        }
        outcomes.remove(&handle.id).ok_or_else(|| Error::NotFound(handle.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::OpenAiConfig;
    use crate::test_support::spawn_mock;
    use axum::routing::post;
    use axum::{Json, Router};
    use mf_core::JobStatus;
    use serde_json::json;
    use std::time::Duration;

    async fn adapter_for(app: Router) -> ImageModelAdapter {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = spawn_mock(app).await;
        ImageModelAdapter::new(Arc::new(OpenAiClient::new(reqwest::Client::new(), config).unwrap()))
    }

    async fn wait_terminal(adapter: &ImageModelAdapter, handle: &ProviderHandle) -> ProviderStatus {
        for _ in 0..100 {
            let status = adapter.poll(handle).await.unwrap();
            if status.status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("image job never finished");
    }

    #[tokio::test]
    async fn test_submit_then_poll_to_completion() {
        let app = Router::new().route(
            "/images/generations",
            post(|| async { Json(json!({"data": [{"url": "https://img/fox.png"}]})) }),
        );
        let adapter = adapter_for(app).await;

        let handle = adapter.submit(&JobInputs::image("a fox", None)).await.unwrap();
        assert_eq!(handle.provider, Provider::ImageModel);
        assert_eq!(wait_terminal(&adapter, &handle).await, ProviderStatus::completed("https://img/fox.png"));

        assert!(matches!(adapter.poll(&handle).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_finished_outcomes_are_released() {
        let app = Router::new().route(
            "/images/generations",
            post(|| async { Json(json!({"data": [{"b64_json": "iVBORw0KGgo="}]})) }),
        );
        let adapter = adapter_for(app).await;

        for _ in 0..20 {
            let handle = adapter.submit(&JobInputs::image("a fox", None)).await.unwrap();
            let status = wait_terminal(&adapter, &handle).await;
            assert_eq!(status.result_url.as_deref(), Some("data:image/png;base64,iVBORw0KGgo="));
        }
        assert!(adapter.outcomes.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failed_status() {
        let app = Router::new().route(
            "/images/generations",
            post(|| async { Json(json!({"data": []})) }),
        );
        let adapter = adapter_for(app).await;

        let handle = adapter.submit(&JobInputs::image("a fox", None)).await.unwrap();
        let status = wait_terminal(&adapter, &handle).await;
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("No image data in response"));
    }

    #[tokio::test]
    async fn test_invalid_size_is_rejected_before_submission() {
        let adapter = adapter_for(Router::new()).await;
        let err = adapter
            .submit(&JobInputs::image("a fox", Some("10x10".into())))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
