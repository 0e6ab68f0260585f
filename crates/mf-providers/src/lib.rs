mod adapter;
pub mod analyzer;
pub mod http;
pub mod image_model;
pub mod kling;
pub mod openai;
pub mod record_store;
pub mod signer;
pub mod veo;

#[cfg(test)]
mod test_support;

pub use adapter::ProviderAdapter;
pub use analyzer::{ImageAnalysis, ImageAnalyzer};
pub use image_model::ImageModelAdapter;
pub use kling::{KlingAdapter, KlingConfig};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use record_store::{RecordStoreClient, Row};
pub use signer::CredentialSigner;
pub use veo::VeoAdapter;
