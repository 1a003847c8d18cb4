use super::{error::ApiError, AppState};
use crate::config::ProxyConfig;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::Response,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const LONG_LIVED_CACHE: &str = "public, max-age=31536000, immutable";

const MAX_REDIRECTS: usize = 10;

/// Upstream hosts the proxy may contact. Empty means any host.
#[derive(Debug, Clone)]
struct HostAllowlist(Arc<[String]>);

impl HostAllowlist {
    fn permits(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        if self.0.is_empty() {
            return true;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.0
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
    }
}

/// Streams media bytes from the platform CDN with browser-like headers.
pub struct MediaProxy {
    client: reqwest::Client,
    referer: String,
    allowed_hosts: HostAllowlist,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

impl MediaProxy {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let allowed_hosts = HostAllowlist(config.allowed_hosts.clone().into());

        // Redirect targets go through the same host check as the request URL.
        // A refused hop stops the chain and surfaces as a 3xx upstream status.
        let redirect_hosts = allowed_hosts.clone();
        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if redirect_hosts.permits(attempt.url()) {
                attempt.follow()
            } else {
                warn!("Refusing proxy redirect to {}", attempt.url());
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(15))
            .redirect(redirect)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            referer: config.referer.clone(),
            allowed_hosts,
        })
    }

    fn validate(&self, raw: &str) -> Result<Url, ApiError> {
        let url = Url::parse(raw).map_err(|_| ApiError::InvalidInput("Invalid media URL"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidInput("Invalid media URL"));
        }

        if self.allowed_hosts.permits(&url) {
            Ok(url)
        } else {
            Err(ApiError::InvalidInput("Media host not allowed"))
        }
    }

    /// Opens the upstream request and returns a response whose body forwards
    /// chunks as they arrive. Dropping the response drops the upstream stream.
    pub async fn forward(&self, raw: &str) -> Result<Response, ApiError> {
        let url = self.validate(raw)?;

        let upstream = self
            .client
            .get(url.clone())
            .header(reqwest::header::REFERER, &self.referer)
            .header(
                reqwest::header::ACCEPT,
                "image/avif,image/webp,image/apng,video/*,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                warn!("Proxy request to {} failed: {}", url, e);
                ApiError::ProxyUpstreamFailure
            })?;

        if !upstream.status().is_success() {
            warn!("Proxy upstream {} returned {}", url, upstream.status());
            return Err(ApiError::ProxyUpstreamFailure);
        }

        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
        let content_length = upstream.headers().get(header::CONTENT_LENGTH).cloned();

        let stream = upstream
            .bytes_stream()
            .inspect_err(move |e| warn!("Proxy stream from {} aborted: {}", url, e));

        let mut response = Response::new(Body::from_stream(stream));
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        if let Some(length) = content_length {
            headers.insert(header::CONTENT_LENGTH, length);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(LONG_LIVED_CACHE),
        );

        Ok(response)
    }
}

/// GET /proxy?url=<encoded>
pub async fn proxy_media(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let target = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or(ApiError::InvalidInput("URL is required"))?;

    info!("Proxying media: {}", target);
    state.proxy.forward(&target).await
}
