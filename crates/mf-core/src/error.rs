use thiserror::Error;

use crate::provider::Provider;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A required request field is missing or malformed. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The provider answered with an application-level error, possibly
    /// wrapped in an otherwise successful transport response.
    #[error("{provider} rejected the request: {message}")]
    ProviderRejected { provider: Provider, message: String },

    /// Credentials or other provider settings are absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("job not found: {0}")]
    NotFound(String),

    /// A bounded poll ran out of attempts before the job became terminal.
    #[error("job {id} did not finish after {attempts} poll attempts")]
    Timeout { id: String, attempts: u32 },

    /// Network or decoding failure while talking to a provider.
    #[error("{context}: {message}")]
    Transport { context: String, message: String },

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("job {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict { id: String, expected: u64, found: u64 },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for the `"<field> is required"` validation failure.
    pub fn required(field: &str) -> Self {
        Self::Validation(format!("{field} is required"))
    }

    pub fn rejected(provider: Provider, message: impl Into<String>) -> Self {
        Self::ProviderRejected { provider, message: message.into() }
    }

    pub fn transport(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport { context: context.into(), message: err.to_string() }
    }

    /// Message shown to the user when this error ends up on a failed job.
    ///
    /// Provider rejections keep the provider's own wording.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
