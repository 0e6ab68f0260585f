pub mod routes;
pub mod schemas;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::routes::api_routes;
use crate::backend::state::GenState;

pub fn app(state: Arc<GenState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves; in-flight requests are allowed to finish.
pub async fn serve(
    port: u16,
    state: Arc<GenState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Starting backend server on port {port}");

    axum::serve(listener, app(state)).with_graceful_shutdown(shutdown).await
}
