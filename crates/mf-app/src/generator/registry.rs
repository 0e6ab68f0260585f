use std::sync::Arc;
use std::time::Duration;

use log::info;
use mf_core::{Provider, Result};
use mf_providers::{
    ImageAnalyzer, ImageModelAdapter, KlingAdapter, KlingConfig, OpenAiClient, OpenAiConfig, ProviderAdapter,
    RecordStoreClient, VeoAdapter, http, record_store,
};
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub openai: OpenAiConfig,
    pub kling: KlingConfig,
    pub backend_url: String,
    pub backend_token: Option<String>,
    /// How long a record-store row listing is served from memory.
    pub rows_cache_ttl: Duration,
    pub http_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::new(""),
            kling: KlingConfig::new("", ""),
            backend_url: record_store::DEFAULT_BASE_URL.to_string(),
            backend_token: None,
            rows_cache_ttl: Duration::from_secs(30),
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Provider clients, built once on first use and shared afterwards.
///
/// Construction validates credentials, so a missing key shows up as a
/// `Configuration` error the first time that provider is asked for. Failed
/// constructions are not cached.
pub struct ProviderRegistry {
    settings: ProviderSettings,
    client: reqwest::Client,
    record_store: RecordStoreClient,
    openai: OnceCell<Arc<OpenAiClient>>,
    image_model: OnceCell<Arc<dyn ProviderAdapter>>,
    video_model_a: OnceCell<Arc<dyn ProviderAdapter>>,
    video_model_b: OnceCell<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = http::build_client(settings.http_timeout)?;
        let record_store = RecordStoreClient::new(client.clone(), &settings.backend_url, settings.backend_token.clone());

        Ok(Self {
            settings,
            client,
            record_store,
            openai: OnceCell::new(),
            image_model: OnceCell::new(),
            video_model_a: OnceCell::new(),
            video_model_b: OnceCell::new(),
        })
    }

    /// Register a ready-made adapter, replacing whatever would be built lazily.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let cell = match adapter.provider() {
            Provider::ImageModel => &mut self.image_model,
            Provider::VideoModelA => &mut self.video_model_a,
            Provider::VideoModelB => &mut self.video_model_b,
        };
        *cell = OnceCell::from(adapter);
        self
    }

    pub fn record_store(&self) -> &RecordStoreClient {
        &self.record_store
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub async fn adapter(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>> {
        let cell = match provider {
            Provider::ImageModel => &self.image_model,
            Provider::VideoModelA => &self.video_model_a,
            Provider::VideoModelB => &self.video_model_b,
        };
        cell.get_or_try_init(|| self.build_adapter(provider)).await.cloned()
    }

    pub async fn openai(&self) -> Result<Arc<OpenAiClient>> {
        self.openai
            .get_or_try_init(|| async {
                let client = OpenAiClient::new(self.client.clone(), self.settings.openai.clone())?;
                info!("Initialized {} client", Provider::ImageModel.name());
                Ok(Arc::new(client))
            })
            .await
            .cloned()
    }

    pub async fn analyzer(&self) -> Result<ImageAnalyzer> {
        Ok(ImageAnalyzer::new(self.openai().await?))
    }

    async fn build_adapter(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>> {
        let adapter: Arc<dyn ProviderAdapter> = match provider {
            Provider::ImageModel => Arc::new(ImageModelAdapter::new(self.openai().await?)),
            Provider::VideoModelA => Arc::new(KlingAdapter::new(self.client.clone(), self.settings.kling.clone())?),
            Provider::VideoModelB => Arc::new(VeoAdapter::new(self.record_store.clone())),
        };
        info!("Initialized {} adapter", provider.name());
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::FakeAdapter;
    use mf_core::Error;

    #[tokio::test]
    async fn test_missing_credentials_surface_on_first_use() {
        let registry = ProviderRegistry::new(ProviderSettings::default()).unwrap();
        assert!(matches!(registry.adapter(Provider::VideoModelA).await, Err(Error::Configuration(_))));
        assert!(matches!(registry.adapter(Provider::ImageModel).await, Err(Error::Configuration(_))));
        assert!(matches!(registry.analyzer().await, Err(Error::Configuration(_))));
        // No credentials needed beyond the backend URL.
        assert!(registry.adapter(Provider::VideoModelB).await.is_ok());
    }

    #[tokio::test]
    async fn test_adapters_are_built_once() {
        let mut settings = ProviderSettings::default();
        settings.kling = KlingConfig::new("ak", "sk");
        let registry = ProviderRegistry::new(settings).unwrap();

        let first = registry.adapter(Provider::VideoModelA).await.unwrap();
        let second = registry.adapter(Provider::VideoModelA).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_injected_adapter_wins() {
        let fake = Arc::new(FakeAdapter::new(Provider::VideoModelA));
        let registry = ProviderRegistry::new(ProviderSettings::default()).unwrap().with_adapter(fake);
        assert_eq!(registry.adapter(Provider::VideoModelA).await.unwrap().provider(), Provider::VideoModelA);
    }
}
