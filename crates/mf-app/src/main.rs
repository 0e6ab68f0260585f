mod backend;
mod config;
mod error;
mod generator;

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::backend::state::GenState;
use crate::config::AppConfig;
use crate::generator::Generator;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    if config.providers.openai.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; image generation and analysis will fail");
    }
    if config.providers.kling.access_key.is_empty() || config.providers.kling.secret_key.is_empty() {
        warn!("KLING_ACCESS_KEY/KLING_SECRET_KEY are not set; video-model-a submissions will fail");
    }

    let generator = Generator::from_config(&config).context("failed to build provider registry")?;
    let state = Arc::new(GenState::new(generator));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        let state = state.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for Ctrl-C: {e}");
                return;
            }
            info!("Shutdown requested");
            state.generator().shutdown();
            shutdown.cancel();
        }
    });

    backend::serve(config.port, state, shutdown.cancelled_owned())
        .await
        .context("server failed")?;

    info!("Server stopped");
    Ok(())
}
