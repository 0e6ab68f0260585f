use async_trait::async_trait;
use mf_core::{JobInputs, Provider, ProviderHandle, ProviderStatus, Result};

/// One external generative-media provider.
///
/// Adapters own the provider's authentication, request encoding and response
/// decoding. They never retry and never hide provider errors.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Submit a generation request. Fails with `ProviderRejected` when the
    /// provider refuses it, even inside an HTTP 200 response.
    async fn submit(&self, inputs: &JobInputs) -> Result<ProviderHandle>;

    /// Fetch the current status, mapped onto the canonical vocabulary.
    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderStatus>;
}
