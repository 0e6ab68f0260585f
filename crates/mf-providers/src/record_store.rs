//! Client for the external record store that owns rows and also fronts the
//! video-model-b generation backend.

use log::info;
use mf_core::{Error, Result};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::decode_response;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
struct FinalizeRequest<'a> {
    row_id: &'a str,
    video_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct RecordStoreClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RecordStoreClient {
    pub fn new(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get_rows(&self) -> Result<Vec<Row>> {
        let context = "listing rows";
        let response = self
            .request(Method::GET, "/rows")
            .send()
            .await
            .map_err(|e| Error::transport(context, e))?;
        decode_response(None, context, response).await
    }

    /// Persist `video_url` on the row. The URL is forwarded byte for byte.
    pub async fn finalize(&self, row_id: &str, video_url: &str) -> Result<Value> {
        let context = format!("finalizing row {row_id}");
        let response = self
            .request(Method::POST, "/finalize")
            .json(&FinalizeRequest { row_id, video_url })
            .send()
            .await
            .map_err(|e| Error::transport(&context, e))?;
        let ack: Value = decode_response(None, &context, response).await?;
        info!("Finalized row {row_id}");
        Ok(ack)
    }
}
