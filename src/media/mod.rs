mod extractor;
mod filter;
mod formats;
mod normalize;
mod types;
mod ytdlp;

pub use extractor::{ExtractError, Extractor};
pub use types::{MediaKind, MediaResult, TypedResponse};
pub use ytdlp::YtDlpExtractor;

use crate::cache::Store;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const SUPPORTED_DOMAIN: &str = "instagram.com";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Normalize(#[from] normalize::NormalizeError),
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid Instagram URL")]
pub struct InvalidUrl;

/// Accepts only http(s) URLs on instagram.com or one of its subdomains.
pub fn parse_instagram_url(raw: &str) -> Result<Url, InvalidUrl> {
    let url = Url::parse(raw.trim()).map_err(|_| InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidUrl);
    }

    let host = url.host_str().ok_or(InvalidUrl)?.to_ascii_lowercase();
    if host == SUPPORTED_DOMAIN || host.ends_with(&format!(".{}", SUPPORTED_DOMAIN)) {
        Ok(url)
    } else {
        Err(InvalidUrl)
    }
}

/// Extraction pipeline: cache lookup, extractor run, normalization, cache store.
/// Concurrent misses on the same key each run the extractor.
pub struct MediaService {
    extractor: Arc<dyn Extractor>,
    results: Arc<dyn Store<MediaResult>>,
    typed_results: Arc<dyn Store<TypedResponse>>,
}

impl MediaService {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        results: Arc<dyn Store<MediaResult>>,
        typed_results: Arc<dyn Store<TypedResponse>>,
    ) -> Self {
        info!("Media service initialized with {}", extractor.name());
        Self {
            extractor,
            results,
            typed_results,
        }
    }

    pub async fn resolve(&self, url: &Url) -> Result<MediaResult, MediaError> {
        let key = url.as_str();
        if let Some(cached) = self.results.get(key).await {
            debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let document = self.extractor.extract(key).await?;
        let result = normalize::assemble(document)?;

        self.results.put(key.to_string(), result.clone()).await;
        Ok(result)
    }

    pub async fn resolve_typed(
        &self,
        url: &Url,
        requested: Option<MediaKind>,
    ) -> Result<TypedResponse, MediaError> {
        let key = format!(
            "{}-{}",
            url.as_str(),
            requested.map(|k| k.as_str()).unwrap_or("all")
        );
        if let Some(cached) = self.typed_results.get(&key).await {
            debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let document = self.extractor.extract(url.as_str()).await?;
        let response = filter::build_typed_response(document, requested)?;

        self.typed_results.put(key, response.clone()).await;
        Ok(response)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeExtractor;
    use super::*;
    use crate::cache::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn service(extractor: Arc<FakeExtractor>) -> MediaService {
        let ttl = Duration::from_secs(600);
        MediaService::new(
            extractor,
            Arc::new(MemoryStore::new(ttl)),
            Arc::new(MemoryStore::new(ttl)),
        )
    }

    fn photo() -> serde_json::Value {
        json!({"title": "Photo", "url": "https://cdn/p.jpg", "ext": "jpg"})
    }

    #[test]
    fn test_parse_instagram_url() {
        assert!(parse_instagram_url("https://www.instagram.com/p/abc/").is_ok());
        assert!(parse_instagram_url("https://instagram.com/reel/xyz").is_ok());
        assert!(parse_instagram_url("  http://WWW.Instagram.com/tv/1  ").is_ok());
        assert!(parse_instagram_url("https://evilinstagram.com/p/abc").is_err());
        assert!(parse_instagram_url("https://instagram.com.evil.io/p/abc").is_err());
        assert!(parse_instagram_url("ftp://instagram.com/p/abc").is_err());
        assert!(parse_instagram_url("--exec rm").is_err());
        assert!(parse_instagram_url("").is_err());
    }

    #[tokio::test]
    async fn test_resolve_caches_result() {
        let extractor = Arc::new(FakeExtractor::returning(photo()));
        let service = service(extractor.clone());
        let url = parse_instagram_url("https://www.instagram.com/p/abc/").unwrap();

        let first = service.resolve(&url).await.unwrap();
        let second = service.resolve(&url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_typed_cache_keyed_by_type() {
        let extractor = Arc::new(FakeExtractor::returning(photo()));
        let service = service(extractor.clone());
        let url = parse_instagram_url("https://www.instagram.com/p/abc/").unwrap();

        service.resolve_typed(&url, None).await.unwrap();
        service.resolve_typed(&url, None).await.unwrap();
        service
            .resolve_typed(&url, Some(MediaKind::Image))
            .await
            .unwrap();

        assert_eq!(extractor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let extractor = Arc::new(FakeExtractor::failing(|| {
            ExtractError::Failed("private".to_string())
        }));
        let service = service(extractor.clone());
        let url = parse_instagram_url("https://www.instagram.com/p/abc/").unwrap();

        assert!(matches!(
            service.resolve(&url).await,
            Err(MediaError::Extract(ExtractError::Failed(_)))
        ));
        assert!(service.resolve(&url).await.is_err());
        assert_eq!(extractor.call_count(), 2);
    }
}
