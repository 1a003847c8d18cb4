use super::formats::{best_audio, best_combined_mp4, RawEntry};
use super::normalize::NormalizeError;
use super::types::{MediaKind, TypedMedia, TypedResponse};

/// Picks the single link for `entry` that best matches the requested kind.
/// Entries with nothing matching yield `None` and are left out of the response.
pub fn filter_entry(entry: &RawEntry, requested: Option<MediaKind>) -> Option<TypedMedia> {
    let is_video = entry.is_video();

    match requested {
        Some(MediaKind::Video) if is_video => {
            return best_combined_mp4(entry.formats()).and_then(|f| {
                Some(TypedMedia {
                    kind: MediaKind::Video,
                    url: f.url.clone()?,
                    ext: Some("mp4".to_string()),
                })
            });
        }
        Some(MediaKind::Audio) => {
            return best_audio(entry.formats()).and_then(|f| {
                Some(TypedMedia {
                    kind: MediaKind::Audio,
                    url: f.url.clone()?,
                    ext: Some(f.ext.clone().unwrap_or_else(|| "m4a".to_string())),
                })
            });
        }
        Some(MediaKind::Image) if !is_video => {
            return entry.url.clone().map(|url| TypedMedia {
                kind: MediaKind::Image,
                url,
                ext: Some("jpg".to_string()),
            });
        }
        _ => {}
    }

    entry.url.clone().filter(|u| !u.is_empty()).map(|url| TypedMedia {
        kind: if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        },
        url,
        ext: entry.ext.clone(),
    })
}

pub fn build_typed_response(
    document: serde_json::Value,
    requested: Option<MediaKind>,
) -> Result<TypedResponse, NormalizeError> {
    let root: RawEntry = serde_json::from_value(document)?;

    let data = match &root.entries {
        Some(entries) => entries
            .iter()
            .flatten()
            .filter_map(|e| filter_entry(e, requested))
            .collect(),
        None => filter_entry(&root, requested).into_iter().collect(),
    };

    Ok(TypedResponse {
        success: true,
        data,
        title: root.title,
        uploader: root.uploader,
    })
}
