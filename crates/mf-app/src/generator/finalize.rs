use std::time::Duration;

use log::debug;
use mf_core::{Error, Result};
use mf_providers::{RecordStoreClient, Row};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedRows {
    fetched_at: Instant,
    rows: Vec<Row>,
}

/// Writes finished artifacts back to the record store and serves its rows.
///
/// The row listing is cached for `ttl` so rows added elsewhere show up
/// eventually; a successful finalize drops the cache at once.
pub struct FinalizeGateway {
    record_store: RecordStoreClient,
    ttl: Duration,
    rows: RwLock<Option<CachedRows>>,
}

impl FinalizeGateway {
    pub fn new(record_store: RecordStoreClient, ttl: Duration) -> Self {
        Self { record_store, ttl, rows: RwLock::new(None) }
    }

    pub async fn rows(&self) -> Result<Vec<Row>> {
        if let Some(cached) = self.rows.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.rows.clone());
            }
        }

        let rows = self.record_store.get_rows().await?;
        debug!("Cached {} rows", rows.len());
        *self.rows.write().await = Some(CachedRows { fetched_at: Instant::now(), rows: rows.clone() });
        Ok(rows)
    }

    /// Persist `video_url` on `row_id`, forwarding the URL unchanged.
    pub async fn finalize(&self, row_id: &str, video_url: &str) -> Result<Value> {
        if row_id.trim().is_empty() {
            return Err(Error::required("rowId"));
        }
        if video_url.trim().is_empty() {
            return Err(Error::required("videoUrl"));
        }

        let ack = self.record_store.finalize(row_id, video_url).await?;
        self.invalidate().await;
        Ok(ack)
    }

    pub async fn invalidate(&self) {
        *self.rows.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Backend {
        listings: AtomicUsize,
        finalized: std::sync::Mutex<Vec<Value>>,
    }

    async fn gateway() -> (Arc<Backend>, FinalizeGateway) {
        gateway_with_ttl(Duration::from_secs(30)).await
    }

    async fn gateway_with_ttl(ttl: Duration) -> (Arc<Backend>, FinalizeGateway) {
        let backend = Arc::new(Backend::default());
        let app = Router::new()
            .route(
                "/rows",
                get(|State(b): State<Arc<Backend>>| async move {
                    b.listings.fetch_add(1, Ordering::SeqCst);
                    Json(json!([{
                        "id": "r1",
                        "title": "Launch teaser",
                        "status": "draft",
                        "created_at": "2026-01-01T00:00:00Z",
                        "updated_at": "2026-01-01T00:00:00Z"
                    }]))
                }),
            )
            .route(
                "/finalize",
                post(|State(b): State<Arc<Backend>>, Json(body): Json<Value>| async move {
                    b.finalized.lock().unwrap().push(body);
                    Json(json!({ "ok": true }))
                }),
            )
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let client = mf_providers::http::build_client(Duration::from_secs(5)).unwrap();
        let store = RecordStoreClient::new(client, &format!("http://{addr}"), None);
        (backend, FinalizeGateway::new(store, ttl))
    }

    #[tokio::test]
    async fn test_rows_are_cached_until_finalize() {
        let (backend, gateway) = gateway().await;

        assert_eq!(gateway.rows().await.unwrap()[0].title, "Launch teaser");
        gateway.rows().await.unwrap();
        assert_eq!(backend.listings.load(Ordering::SeqCst), 1);

        gateway.finalize("r1", "https://a/out.mp4").await.unwrap();
        gateway.rows().await.unwrap();
        assert_eq!(backend.listings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rows_are_refetched_after_ttl() {
        let (backend, gateway) = gateway_with_ttl(Duration::from_millis(50)).await;

        gateway.rows().await.unwrap();
        gateway.rows().await.unwrap();
        assert_eq!(backend.listings.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        gateway.rows().await.unwrap();
        assert_eq!(backend.listings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_url_is_forwarded_unchanged() {
        let (backend, gateway) = gateway().await;
        let url = "https://cdn.example.com/v/out%20final.mp4?sig=a+b&exp=1";

        gateway.finalize("r1", url).await.unwrap();

        let sent = backend.finalized.lock().unwrap().clone();
        assert_eq!(sent, vec![json!({ "row_id": "r1", "video_url": url })]);
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected_locally() {
        let (backend, gateway) = gateway().await;
        assert_eq!(gateway.finalize("", "https://a").await.unwrap_err(), Error::required("rowId"));
        assert_eq!(gateway.finalize("r1", " ").await.unwrap_err(), Error::required("videoUrl"));
        assert!(backend.finalized.lock().unwrap().is_empty());
    }
}
