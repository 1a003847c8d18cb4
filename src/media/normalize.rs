use super::formats::{select_items, RawEntry};
use super::types::{Entry, MediaResult, Metadata};
use crate::utils::format_duration;
use tracing::{debug, warn};

const DEFAULT_TITLE: &str = "Instagram Post";

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Extractor output is not a media document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("No downloadable media found")]
    NoMedia,
}

pub fn build_metadata(entry: &RawEntry) -> Metadata {
    Metadata {
        uploader: entry
            .uploader
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        uploader_url: entry.uploader_url.clone(),
        upload_date: entry.upload_date.clone(),
        description: entry
            .description
            .clone()
            .unwrap_or_else(|| "No description".to_string()),
        view_count: entry.view_count.unwrap_or(0),
        like_count: entry.like_count.unwrap_or(0),
        comment_count: entry.comment_count.unwrap_or(0),
        duration: format_duration(entry.duration),
        webpage_url: entry.webpage_url.clone(),
        tags: entry.tags.clone().unwrap_or_default(),
    }
}

pub fn normalize_entry(entry: &RawEntry) -> Entry {
    Entry {
        items: select_items(entry),
        metadata: build_metadata(entry),
    }
}

/// Shapes an extractor document into a [`MediaResult`]. Any document with an
/// `entries` array becomes a carousel, even with a single slide.
pub fn assemble(document: serde_json::Value) -> Result<MediaResult, NormalizeError> {
    let root: RawEntry = serde_json::from_value(document)?;
    let title = root
        .title
        .clone()
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    match &root.entries {
        Some(raw_entries) => {
            let mut entries = Vec::with_capacity(raw_entries.len());
            for (index, raw) in raw_entries.iter().enumerate() {
                let Some(raw) = raw else {
                    warn!("Carousel slide {} missing from extractor output", index);
                    continue;
                };
                let entry = normalize_entry(raw);
                if entry.items.is_empty() {
                    warn!("Carousel slide {} has no downloadable media", index);
                    continue;
                }
                entries.push(entry);
            }

            if entries.is_empty() {
                return Err(NormalizeError::NoMedia);
            }

            debug!("Assembled carousel with {} entries", entries.len());
            Ok(MediaResult::Carousel {
                entries,
                title,
                main_metadata: build_metadata(&root),
            })
        }
        None => {
            let Entry { items, metadata } = normalize_entry(&root);
            if items.is_empty() {
                return Err(NormalizeError::NoMedia);
            }

            debug!("Assembled single post with {} items", items.len());
            Ok(MediaResult::Single {
                items,
                metadata,
                title,
            })
        }
    }
}
