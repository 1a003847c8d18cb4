use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }
}

/// One downloadable asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub uploader: String,
    pub uploader_url: Option<String>,
    pub upload_date: Option<String>,
    pub description: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    /// Preformatted as `M:SS` or `N/A`.
    pub duration: String,
    pub webpage_url: Option<String>,
    pub tags: Vec<String>,
}

/// One slide of a carousel, or the only unit of a single post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub items: Vec<MediaItem>,
    pub metadata: Metadata,
}

/// Normalized extraction result. The tag follows the shape of the extractor
/// document, not the number of slides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaResult {
    Single {
        items: Vec<MediaItem>,
        metadata: Metadata,
        title: String,
    },
    Carousel {
        entries: Vec<Entry>,
        title: String,
        #[serde(rename = "mainMetadata")]
        main_metadata: Metadata,
    },
}

/// Flat per-entry link returned by the typed API endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedMedia {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub ext: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedResponse {
    pub success: bool,
    pub data: Vec<TypedMedia>,
    pub title: Option<String>,
    pub uploader: Option<String>,
}
