use std::time::Duration;

use log::debug;
use mf_core::{Error, Provider, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

const MAX_ERROR_BODY: usize = 300;

/// Shared outbound client; one per process, cloned into each adapter.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Decode an upstream response.
///
/// A 4xx body that carries a message becomes [`Error::ProviderRejected`] when
/// `provider` is known. Server errors and rate limiting are
/// [`Error::Transport`] so that status polling retries them.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    provider: Option<Provider>,
    context: &str,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::transport(context, e))?;

    if !status.is_success() {
        debug!("{context}: HTTP {status}");
        return Err(match (error_message(&body), provider) {
            (Some(message), Some(provider)) if !is_retryable(status) => Error::rejected(provider, message),
            (Some(message), _) => Error::transport(context, format!("HTTP {status}: {message}")),
            (None, _) => Error::transport(context, format!("HTTP {status}: {}", truncate(&body))),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::transport(context, format!("invalid response body: {e}")))
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Pull a human readable message out of the error shapes our providers use:
/// `{"message": ..}`, `{"error": {"message": ..}}` and `{"error": ".."}`.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| value.get("error").and_then(Value::as_str))?;
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"code":1201,"message":"bad image"}"#).as_deref(), Some("bad image"));
        assert_eq!(
            error_message(r#"{"error":{"message":"invalid key","type":"auth"}}"#).as_deref(),
            Some("invalid key")
        );
        assert_eq!(error_message(r#"{"error":"quota exceeded"}"#).as_deref(), Some("quota exceeded"));
        assert_eq!(error_message(r#"{"message":""}"#), None);
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&long).chars().count(), MAX_ERROR_BODY);
        assert_eq!(truncate("short"), "short");
    }
}
