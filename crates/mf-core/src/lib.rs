pub mod description;
pub mod error;
pub mod image_source;
pub mod job;
mod provider;

pub use error::{Error, Result};
pub use image_source::ImageSource;
pub use job::{Job, JobInputs, JobKind, JobPatch, JobStatus};
pub use provider::{Provider, ProviderHandle, ProviderStatus};
