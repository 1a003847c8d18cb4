use super::{error::ApiError, AppState};
use crate::media::{parse_instagram_url, MediaKind, MediaResult, TypedResponse};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{Extensions, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypedRequest {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub key: Option<String>,
}

/// First `X-Forwarded-For` hop, else the socket peer, else `anonymous`.
pub fn client_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn require_url(url: Option<String>) -> Result<Url, ApiError> {
    let raw = url
        .filter(|u| !u.trim().is_empty())
        .ok_or(ApiError::InvalidInput("URL is required"))?;
    parse_instagram_url(&raw).map_err(|_| ApiError::InvalidInput("Invalid Instagram URL"))
}

fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(inner)| inner).map_err(|rejection| {
        warn!("Rejected request body: {}", rejection);
        ApiError::InvalidInput("Invalid request body")
    })
}

/// POST /download
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<MediaResult>, ApiError> {
    let client = client_key(&headers, &extensions);
    if !state.download_limiter.check(&client).await {
        warn!("Rate limit exceeded for {}", client);
        return Err(ApiError::RateLimited);
    }

    let url = require_url(read_body(body)?.url)?;
    info!("Download request from {} for {}", client, url);

    let result = state.media.resolve(&url).await?;
    Ok(Json(result))
}

/// POST /api/instagram/v2
pub async fn typed_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Result<Json<TypedRequest>, JsonRejection>,
) -> Result<Json<TypedResponse>, ApiError> {
    let client = client_key(&headers, &extensions);
    if !state.api_limiter.check(&client).await {
        warn!("Rate limit exceeded for {}", client);
        return Err(ApiError::RateLimited);
    }

    let request = read_body(body)?;
    if let Some(expected) = state.api_key.as_deref() {
        if request.key.as_deref() != Some(expected) {
            return Err(ApiError::Unauthorized);
        }
    }

    let url = require_url(request.url)?;
    info!(
        "Typed request from {} for {} ({})",
        client,
        url,
        request.kind.map(|k| k.as_str()).unwrap_or("all")
    );

    let response = state.media.resolve_typed(&url, request.kind).await?;
    Ok(Json(response))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::media::testing::FakeExtractor;
    use crate::media::ExtractError;
    use crate::server::router;
    use axum::{body::Body, http::Request, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const POST_URL: &str = "https://www.instagram.com/p/Cabc123/";

    fn reel() -> Value {
        json!({
            "title": "Reel",
            "uploader": "creator",
            "like_count": 42,
            "duration": 75,
            "url": "https://cdn/merged.mp4",
            "formats": [
                {"height": 720, "vcodec": "avc1", "acodec": "mp4a", "ext": "mp4", "url": "https://cdn/720"},
                {"vcodec": "none", "acodec": "mp4a", "abr": 128.0, "ext": "m4a", "url": "https://cdn/audio"}
            ]
        })
    }

    fn app_with(config: Config, extractor: FakeExtractor) -> (Router, Arc<FakeExtractor>) {
        let extractor = Arc::new(extractor);
        let state = AppState::new(&config, extractor.clone()).unwrap();
        (router(state), extractor)
    }

    fn app(extractor: FakeExtractor) -> (Router, Arc<FakeExtractor>) {
        app_with(Config::default(), extractor)
    }

    fn post(uri: &str, body: Value, client: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", client)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        let mut extensions = Extensions::new();
        assert_eq!(client_key(&headers, &extensions), "anonymous");

        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5555))));
        assert_eq!(client_key(&headers, &extensions), "10.0.0.7");

        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers, &extensions), "203.0.113.9");
    }

    #[tokio::test]
    async fn test_download_single() {
        let (app, _) = app(FakeExtractor::returning(reel()));
        let (status, body) = send(&app, post("/download", json!({"url": POST_URL}), "1.1.1.1")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "single");
        assert_eq!(body["title"], "Reel");
        assert_eq!(body["items"][0]["type"], "video");
        assert_eq!(body["items"][0]["url"], "https://cdn/720");
        assert_eq!(body["items"][1]["type"], "audio");
        assert_eq!(body["metadata"]["likeCount"], 42);
        assert_eq!(body["metadata"]["duration"], "1:15");
        assert_eq!(body["metadata"]["description"], "No description");
    }

    #[tokio::test]
    async fn test_download_carousel() {
        let doc = json!({
            "title": "Album",
            "uploader": "owner",
            "entries": [{"url": "https://cdn/1.jpg", "ext": "jpg"}, reel()]
        });
        let (app, _) = app(FakeExtractor::returning(doc));
        let (status, body) = send(&app, post("/download", json!({"url": POST_URL}), "1.1.1.1")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "carousel");
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
        assert_eq!(body["mainMetadata"]["uploader"], "owner");
    }

    #[tokio::test]
    async fn test_download_invalid_input() {
        let (app, extractor) = app(FakeExtractor::returning(reel()));

        let (status, body) = send(&app, post("/download", json!({}), "1.1.1.1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "URL is required");

        let (status, body) = send(
            &app,
            post("/download", json!({"url": "https://example.com/p/abc"}), "1.1.1.1"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid Instagram URL");

        let request = Request::builder()
            .method("POST")
            .uri("/download")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_download_extraction_failed() {
        let (app, _) = app(FakeExtractor::failing(|| {
            ExtractError::Failed("ERROR: [Instagram] login required".to_string())
        }));
        let (status, body) = send(&app, post("/download", json!({"url": POST_URL}), "1.1.1.1")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("private or restricted"));
        assert!(!body["error"].as_str().unwrap().contains("login"));
    }

    #[tokio::test]
    async fn test_download_extraction_timeout() {
        let (app, _) = app(FakeExtractor::failing(|| {
            ExtractError::Timeout(Duration::from_secs(60))
        }));
        let (status, _) = send(&app, post("/download", json!({"url": POST_URL}), "1.1.1.1")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_download_rate_limited_per_client() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 2;
        let (app, extractor) = app_with(config, FakeExtractor::returning(reel()));

        for _ in 0..2 {
            let (status, _) = send(&app, post("/download", json!({"url": POST_URL}), "9.9.9.9")).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(&app, post("/download", json!({"url": POST_URL}), "9.9.9.9")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded");

        let (status, _) = send(&app, post("/download", json!({"url": POST_URL}), "8.8.8.8")).await;
        assert_eq!(status, StatusCode::OK);

        // Second and later hits come from the cache.
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_typed_download() {
        let (app, _) = app(FakeExtractor::returning(reel()));
        let (status, body) = send(
            &app,
            post("/api/instagram/v2", json!({"url": POST_URL, "type": "audio"}), "1.1.1.1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["uploader"], "creator");
        assert_eq!(body["data"][0]["type"], "audio");
        assert_eq!(body["data"][0]["url"], "https://cdn/audio");
    }

    #[tokio::test]
    async fn test_typed_download_api_key() {
        let mut config = Config::default();
        config.api.key = Some("letmein".to_string());
        let (app, extractor) = app_with(config, FakeExtractor::returning(reel()));

        let (status, body) = send(
            &app,
            post("/api/instagram/v2", json!({"url": POST_URL, "key": "wrong"}), "1.1.1.1"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized: Invalid API Key");
        assert_eq!(extractor.call_count(), 0);

        let (status, _) = send(
            &app,
            post("/api/instagram/v2", json!({"url": POST_URL, "key": "letmein"}), "1.1.1.1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_typed_download_unknown_type_rejected() {
        let (app, _) = app(FakeExtractor::returning(reel()));
        let (status, _) = send(
            &app,
            post("/api/instagram/v2", json!({"url": POST_URL, "type": "gif"}), "1.1.1.1"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_endpoints_have_separate_limits() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 1;
        config.rate_limit.api_max_requests = 1;
        let (app, _) = app_with(config, FakeExtractor::returning(reel()));

        let (status, _) = send(&app, post("/download", json!({"url": POST_URL}), "5.5.5.5")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, post("/api/instagram/v2", json!({"url": POST_URL}), "5.5.5.5")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, post("/api/instagram/v2", json!({"url": POST_URL}), "5.5.5.5")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(FakeExtractor::returning(reel()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
