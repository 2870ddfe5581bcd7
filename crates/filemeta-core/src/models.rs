//! Core data models for filemeta.
//!
//! These types are shared across the filemeta crates and are the only
//! values returned to callers. They are created fresh per call and carry
//! no references into extractor state.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Ordered mapping from section name (`ifd0`, `exif`, `gps`, `icc`,
/// `format`, ...) to an arbitrary JSON value.
pub type NestedMapping = serde_json::Map<String, JsonValue>;

// =============================================================================
// FILE METADATA
// =============================================================================

/// Metadata derived from a single file.
///
/// Every field is optional; presence means the value was successfully
/// derived. `duration` is in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NestedMapping>,
    /// Base64-encoded ThumbHash of the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbhash: Option<String>,
}

impl Metadata {
    /// True when nothing was derived.
    pub fn is_empty(&self) -> bool {
        self == &Metadata::default()
    }
}

/// The caller's partial record for a stored file.
///
/// `location` and `filename_disk` address the bytes through a
/// [`StreamSource`](crate::StreamSource); the remaining fields are values
/// already known to the caller (for example from a previous version of a
/// replaced file) and are never overwritten by extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub location: String,
    pub filename_disk: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NestedMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbhash: Option<String>,
}

impl FileRecord {
    pub fn new(location: impl Into<String>, filename_disk: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            filename_disk: filename_disk.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// EMBED METADATA
// =============================================================================

/// Embed metadata resolved for a remote URL.
///
/// `embed_type` is `"embed/<oembed type>"` and is only present when the
/// oEmbed descriptor reported a `type`. `duration` is in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedMetadata {
    pub embed_url: String,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub embed_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `{ "oembed": {...}, ...page scrape fields }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NestedMapping>,
}

impl EmbedMetadata {
    /// The untouched seed returned for non-embeddable URLs.
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            embed_url: url.into(),
            ..Default::default()
        }
    }
}

/// A single favicon candidate. Only candidates with a URL can resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FaviconCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// A candidate whose strategy found nothing usable.
    pub fn empty() -> Self {
        Self { url: None }
    }

    /// The candidate's URL, if present and non-blank.
    pub fn usable_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_default_is_empty() {
        assert!(Metadata::default().is_empty());
        let meta = Metadata {
            width: Some(10),
            ..Default::default()
        };
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_metadata_serialization_skips_none() {
        let meta = Metadata {
            width: Some(640),
            height: Some(480),
            ..Default::default()
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({ "width": 640, "height": 480 }));
    }

    #[test]
    fn test_embed_metadata_type_field_name() {
        let embed = EmbedMetadata {
            embed_type: Some("embed/video".to_string()),
            ..EmbedMetadata::seed("https://example.com/v/1")
        };
        let value = serde_json::to_value(&embed).unwrap();
        assert_eq!(value["type"], "embed/video");
        assert_eq!(value["embed_url"], "https://example.com/v/1");
    }

    #[test]
    fn test_embed_seed_has_only_url() {
        let value = serde_json::to_value(EmbedMetadata::seed("https://a.test")).unwrap();
        assert_eq!(value, json!({ "embed_url": "https://a.test" }));
    }

    #[test]
    fn test_file_record_deserializes_type() {
        let record: FileRecord = serde_json::from_value(json!({
            "location": "local",
            "filename_disk": "abc.jpg",
            "type": "image/jpeg",
            "title": "Existing"
        }))
        .unwrap();
        assert_eq!(record.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(record.title.as_deref(), Some("Existing"));
        assert!(record.width.is_none());
    }

    #[test]
    fn test_favicon_candidate_usable_url() {
        assert_eq!(FaviconCandidate::new("a.ico").usable_url(), Some("a.ico"));
        assert_eq!(FaviconCandidate::new("  ").usable_url(), None);
        assert_eq!(FaviconCandidate::empty().usable_url(), None);
    }
}
