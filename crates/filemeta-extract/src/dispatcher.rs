//! Extraction dispatcher.
//!
//! Routes a stored file to the image or media probe extractor by its
//! declared MIME type and overlays the derived fields onto what the
//! caller already knows: a derived value is only returned for fields the
//! caller's record leaves unset.

use std::sync::Arc;

use tracing::{debug, info, warn};

use filemeta_core::config::normalize_mime;
use filemeta_core::defaults::IMAGE_MIME_PREFIX;
use filemeta_core::{
    AllowList, FileRecord, Metadata, MetadataConfig, MetadataExtractor, NestedMapping,
    StreamSource,
};

use crate::imaging::ImageExtractor;
use crate::probe::ProbeExtractor;

/// Entry point for file metadata extraction.
#[derive(Clone)]
pub struct MetadataDispatcher {
    config: MetadataConfig,
    image: Arc<dyn MetadataExtractor>,
    media: Arc<dyn MetadataExtractor>,
}

impl MetadataDispatcher {
    /// Dispatcher with the built-in extractors and an env-configured
    /// ffprobe.
    pub fn new(config: MetadataConfig) -> Self {
        Self::with_extractors(
            config,
            Arc::new(ImageExtractor::new()),
            Arc::new(ProbeExtractor::from_env()),
        )
    }

    pub fn with_extractors(
        config: MetadataConfig,
        image: Arc<dyn MetadataExtractor>,
        media: Arc<dyn MetadataExtractor>,
    ) -> Self {
        Self {
            config,
            image,
            media,
        }
    }

    pub fn from_env() -> Self {
        Self::new(MetadataConfig::from_env())
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Extract metadata for `existing` using the configured allow list.
    pub async fn extract(
        &self,
        existing: &FileRecord,
        source: &dyn StreamSource,
        declared_type: &str,
    ) -> Metadata {
        self.extract_with_allow_list(existing, source, declared_type, &self.config.allow_list)
            .await
    }

    /// Extract metadata with a per-call allow list.
    pub async fn extract_with_allow_list(
        &self,
        existing: &FileRecord,
        source: &dyn StreamSource,
        declared_type: &str,
        allow_list: &AllowList,
    ) -> Metadata {
        if !self.config.is_supported(declared_type) {
            debug!(
                subsystem = "extract",
                component = "dispatcher",
                mime_type = declared_type,
                "Unsupported type, skipping extraction"
            );
            return Metadata::default();
        }

        let extractor = if normalize_mime(declared_type).starts_with(IMAGE_MIME_PREFIX) {
            &self.image
        } else {
            &self.media
        };

        let stream = match source
            .open(&existing.location, &existing.filename_disk)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    subsystem = "extract",
                    component = "dispatcher",
                    filename = %existing.filename_disk,
                    error = %e,
                    "Failed to open file stream"
                );
                return Metadata::default();
            }
        };

        debug!(
            subsystem = "extract",
            component = "dispatcher",
            mime_type = declared_type,
            extractor = extractor.name(),
            "Dispatching extraction"
        );
        let derived = extractor.extract(stream, allow_list).await;
        let result = overlay(existing, derived);

        info!(
            subsystem = "extract",
            component = "dispatcher",
            filename = %existing.filename_disk,
            mime_type = declared_type,
            empty = result.is_empty(),
            "File metadata extraction complete"
        );
        result
    }
}

/// Keep each derived field only where `existing` has no value.
///
/// "No value" is broader than a missing field: a whitespace-only string
/// and an empty metadata mapping are also replaced by derived values.
/// Numeric fields count as set whenever present, so a caller's zero is
/// preserved.
pub fn overlay(existing: &FileRecord, derived: Metadata) -> Metadata {
    Metadata {
        width: keep_if_unset(&existing.width, derived.width),
        height: keep_if_unset(&existing.height, derived.height),
        duration: keep_if_unset(&existing.duration, derived.duration),
        title: keep_if_unset(&existing.title, derived.title),
        description: keep_if_unset(&existing.description, derived.description),
        tags: keep_if_unset(&existing.tags, derived.tags),
        metadata: keep_if_unset(&existing.metadata, derived.metadata),
        thumbhash: keep_if_unset(&existing.thumbhash, derived.thumbhash),
    }
}

fn keep_if_unset<T: Unset>(existing: &Option<T>, derived: Option<T>) -> Option<T> {
    match existing {
        Some(value) if !value.is_unset() => None,
        _ => derived,
    }
}

trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for u32 {
    fn is_unset(&self) -> bool {
        false
    }
}

impl Unset for u64 {
    fn is_unset(&self) -> bool {
        false
    }
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Unset for NestedMapping {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn derived() -> Metadata {
        Metadata {
            width: Some(100),
            height: Some(50),
            duration: Some(1500),
            title: Some("Derived".to_string()),
            description: Some("Derived description".to_string()),
            tags: Some("a, b".to_string()),
            metadata: json!({ "ifd0": { "Make": "Acme" } }).as_object().cloned(),
            thumbhash: Some("hash".to_string()),
        }
    }

    #[test]
    fn test_overlay_on_empty_record_keeps_everything() {
        let record = FileRecord::new("local", "a.jpg");
        assert_eq!(overlay(&record, derived()), derived());
    }

    #[test]
    fn test_overlay_never_clobbers_title() {
        let record = FileRecord {
            title: Some("Caller title".to_string()),
            ..FileRecord::new("local", "a.jpg")
        };
        let result = overlay(&record, derived());
        assert!(result.title.is_none());
        assert_eq!(result.description.as_deref(), Some("Derived description"));
    }

    #[test]
    fn test_overlay_preserves_zero_dimensions() {
        let record = FileRecord {
            width: Some(0),
            duration: Some(0),
            ..FileRecord::new("local", "a.jpg")
        };
        let result = overlay(&record, derived());
        assert!(result.width.is_none());
        assert!(result.duration.is_none());
        assert_eq!(result.height, Some(50));
    }

    #[test]
    fn test_overlay_treats_blank_text_and_empty_map_as_unset() {
        let record = FileRecord {
            tags: Some("  ".to_string()),
            metadata: Some(NestedMapping::new()),
            ..FileRecord::new("local", "a.jpg")
        };
        let result = overlay(&record, derived());
        assert_eq!(result.tags.as_deref(), Some("a, b"));
        assert!(result.metadata.is_some());
    }
}
