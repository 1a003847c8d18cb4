mod error;
mod handlers;
mod proxy;

use crate::{
    cache::MemoryStore,
    config::Config,
    media::{Extractor, MediaService, YtDlpExtractor},
    rate_limit::RateLimiter,
};
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use proxy::MediaProxy;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

/// Shared state handed to every handler. Owns the cache and rate-limit
/// stores for the lifetime of the server.
#[derive(Clone)]
pub struct AppState {
    media: Arc<MediaService>,
    download_limiter: RateLimiter,
    api_limiter: RateLimiter,
    proxy: Arc<MediaProxy>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: &Config, extractor: Arc<dyn Extractor>) -> Result<Self> {
        let ttl = config.cache.ttl();
        let media = MediaService::new(
            extractor,
            Arc::new(MemoryStore::new(ttl)),
            Arc::new(MemoryStore::new(ttl)),
        );

        let window = config.rate_limit.window();
        Ok(Self {
            media: Arc::new(media),
            download_limiter: RateLimiter::new(window, config.rate_limit.max_requests),
            api_limiter: RateLimiter::new(window, config.rate_limit.api_max_requests),
            proxy: Arc::new(MediaProxy::new(&config.proxy)?),
            api_key: config.api.key.as_deref().map(Arc::from),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/download", post(handlers::download))
        .route("/api/instagram/v2", post(handlers::typed_download))
        .route("/proxy", get(proxy::proxy_media))
        .route("/health", get(handlers::health))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let extractor = YtDlpExtractor::new(&config.extractor);
    if !extractor.test_availability().await {
        tracing::warn!(
            "Extractor {} is not available, extraction requests will fail",
            config.extractor.binary
        );
    }

    let state = AppState::new(&config, Arc::new(extractor))?;
    let app = router(state);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    info!("Listening on http://{}", listener.local_addr()?);
    info!("  POST /download          - Normalized media links");
    info!("  POST /api/instagram/v2  - Typed media links");
    info!("  GET  /proxy?url=        - Media passthrough");
    info!("  GET  /health            - Health check");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
