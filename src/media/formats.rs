use super::types::{MediaItem, MediaKind};
use crate::utils::format_filesize;
use serde::Deserialize;

/// One stream as listed by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFormat {
    pub url: Option<String>,
    pub ext: Option<String>,
    pub container: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub resolution: Option<String>,
    pub abr: Option<f64>,
    pub tbr: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

/// An extractor document: a single post, one carousel slide, or a playlist
/// wrapper carrying `entries`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub url: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub thumbnail: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub uploader: Option<String>,
    pub uploader_url: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub duration: Option<f64>,
    pub webpage_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub formats: Option<Vec<RawFormat>>,
    pub entries: Option<Vec<Option<RawEntry>>>,
}

/// Codec strings are absent when missing, empty or the literal `none`.
fn has_codec(codec: &Option<String>) -> bool {
    codec
        .as_deref()
        .is_some_and(|c| !c.is_empty() && c != "none")
}

fn has_url(url: &Option<String>) -> bool {
    url.as_deref().is_some_and(|u| !u.is_empty())
}

/// Picks the candidate with the greatest key; ties keep the earliest one.
fn first_max_by_key<'a, T, K, F>(items: impl Iterator<Item = &'a T>, key: F) -> Option<&'a T>
where
    T: 'a,
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    let mut best: Option<(&'a T, K)> = None;
    for item in items {
        let k = key(item);
        if best.as_ref().map_or(true, |(_, best_key)| k > *best_key) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}

impl RawFormat {
    pub fn has_video(&self) -> bool {
        has_codec(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        has_codec(&self.acodec)
    }

    pub fn is_mp4(&self) -> bool {
        self.ext.as_deref() == Some("mp4") || self.container.as_deref() == Some("mp4")
    }

    fn height_key(&self) -> u32 {
        self.height.unwrap_or(0)
    }

    fn bitrate_key(&self) -> f64 {
        self.abr.or(self.tbr).unwrap_or(0.0)
    }

    fn resolution_label(&self) -> Option<String> {
        if let Some(res) = self.resolution.as_deref().filter(|r| *r != "audio only") {
            return Some(res.to_string());
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            (None, Some(h)) => Some(format!("{}p", h)),
            _ => None,
        }
    }

    fn size(&self) -> Option<f64> {
        self.filesize.or(self.filesize_approx)
    }
}

impl RawEntry {
    pub fn formats(&self) -> &[RawFormat] {
        self.formats.as_deref().unwrap_or(&[])
    }

    /// An entry is a video when any of its formats carries a video codec.
    /// Entries without a format list fall back to their own codec field.
    pub fn is_video(&self) -> bool {
        if self.formats().is_empty() {
            return has_codec(&self.vcodec);
        }
        self.formats().iter().any(RawFormat::has_video)
    }
}

/// Best combined video+audio mp4 stream by height.
pub fn best_combined_mp4(formats: &[RawFormat]) -> Option<&RawFormat> {
    first_max_by_key(
        formats
            .iter()
            .filter(|f| f.has_video() && f.has_audio() && has_url(&f.url) && f.is_mp4()),
        RawFormat::height_key,
    )
}

/// Primary video stream: combined mp4, then any combined, then video-only.
pub fn best_video(formats: &[RawFormat]) -> Option<&RawFormat> {
    best_combined_mp4(formats)
        .or_else(|| {
            first_max_by_key(
                formats
                    .iter()
                    .filter(|f| f.has_video() && f.has_audio() && has_url(&f.url)),
                RawFormat::height_key,
            )
        })
        .or_else(|| {
            first_max_by_key(
                formats
                    .iter()
                    .filter(|f| f.has_video() && has_url(&f.url)),
                RawFormat::height_key,
            )
        })
}

/// Best audio-only stream by bitrate.
pub fn best_audio(formats: &[RawFormat]) -> Option<&RawFormat> {
    first_max_by_key(
        formats
            .iter()
            .filter(|f| !f.has_video() && f.has_audio() && has_url(&f.url)),
        RawFormat::bitrate_key,
    )
}

/// Builds the downloadable items for one entry. A video entry yields its
/// primary stream plus, when present, a separate audio-only stream.
pub fn select_items(entry: &RawEntry) -> Vec<MediaItem> {
    let mut items = Vec::new();

    if entry.is_video() {
        let formats = entry.formats();
        match best_video(formats) {
            Some(format) => items.push(MediaItem {
                kind: MediaKind::Video,
                url: format.url.clone().unwrap_or_default(),
                thumbnail: entry.thumbnail.clone(),
                title: entry.title.clone(),
                resolution: format.resolution_label(),
                ext: format.ext.clone(),
                filesize: Some(format_filesize(format.size())),
            }),
            None => {
                if let Some(url) = entry.url.clone().filter(|u| !u.is_empty()) {
                    items.push(MediaItem {
                        kind: MediaKind::Video,
                        url,
                        thumbnail: entry.thumbnail.clone(),
                        title: entry.title.clone(),
                        resolution: entry_resolution(entry),
                        ext: entry.ext.clone(),
                        filesize: Some(format_filesize(entry.filesize.or(entry.filesize_approx))),
                    });
                }
            }
        }

        if !items.is_empty() {
            if let Some(audio) = best_audio(formats) {
                items.push(MediaItem {
                    kind: MediaKind::Audio,
                    url: audio.url.clone().unwrap_or_default(),
                    thumbnail: entry.thumbnail.clone(),
                    title: Some(format!(
                        "{} (Audio)",
                        entry.title.as_deref().unwrap_or("Instagram")
                    )),
                    resolution: None,
                    ext: audio.ext.clone(),
                    filesize: Some(format_filesize(audio.size())),
                });
            }
        }
    } else if let Some(url) = entry
        .url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| entry.thumbnail.clone())
    {
        items.push(MediaItem {
            kind: MediaKind::Image,
            url,
            thumbnail: entry.thumbnail.clone(),
            title: entry.title.clone(),
            resolution: entry_resolution(entry),
            ext: entry.ext.clone(),
            filesize: Some(format_filesize(entry.filesize.or(entry.filesize_approx))),
        });
    }

    items
}

fn entry_resolution(entry: &RawEntry) -> Option<String> {
    match (entry.width, entry.height) {
        (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
        _ => None,
    }
}
