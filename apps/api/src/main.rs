mod analysis;
mod cache;
mod config;
mod cv;
mod errors;
#[cfg(test)]
mod fixtures;
mod llm_client;
mod personalization;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{JsonFileBackend, ResponseCache, SystemClock};
use crate::config::Config;
use crate::cv::source::FsDocumentSource;
use crate::llm_client::LlmClient;
use crate::personalization::{CacheTtls, PersonalizationPipeline};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize response cache (loads persisted entries, starts the debounced flusher)
    let backend = Arc::new(JsonFileBackend::new(&config.cache_path));
    let cache = ResponseCache::init(backend, Arc::new(SystemClock), config.cache_flush_debounce).await;
    let sweeper = cache.spawn_sweeper(config.cache_sweep_interval);
    info!(
        "Response cache ready at {} ({} active entries)",
        config.cache_path.display(),
        cache.stats().active_entries
    );

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let pipeline = PersonalizationPipeline::new(
        llm,
        cache.clone(),
        CacheTtls {
            analysis: config.analysis_cache_ttl,
            personalization: config.personalization_cache_ttl,
        },
    );

    let state = AppState {
        cache: cache.clone(),
        source: Arc::new(FsDocumentSource::new(&config.content_dir)),
        pipeline,
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    cache.shutdown().await;
    info!("Cache flushed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
