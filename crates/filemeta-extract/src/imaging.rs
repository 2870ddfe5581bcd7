//! Image metadata extraction.
//!
//! Reads the whole stream, then on a blocking worker thread:
//! 1. reads container dimensions and raw tag blocks
//! 2. decodes EXIF, ICC, IPTC, and XMP independently
//! 3. corrects dimensions for rotated orientations
//! 4. surfaces IPTC caption, headline, and keywords
//! 5. filters and trims the assembled sections
//! 6. computes a ThumbHash over a 100x100 resample

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use image::imageops::FilterType;
use image::DynamicImage;
use serde_json::Value as JsonValue;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

use filemeta_core::defaults::{ORIENTATION_ROTATED_MIN, TAGS_SEPARATOR, THUMBHASH_MAX_DIMENSION};
use filemeta_core::{
    trim_strings, AllowList, ByteStream, Error, Metadata, MetadataExtractor, NestedMapping, Result,
};

use crate::container::read_image;
use crate::decoders::{decode_exif, decode_icc, decode_iptc, decode_xmp, IptcData, TagFormat};

/// Extracts metadata from image bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataExtractor for ImageExtractor {
    async fn extract(&self, mut stream: ByteStream, allow_list: &AllowList) -> Metadata {
        let mut bytes = Vec::new();
        if let Err(e) = stream.read_to_end(&mut bytes).await {
            warn!(
                subsystem = "extract",
                component = "image",
                error = %e,
                "Failed to read image stream"
            );
            return Metadata::default();
        }

        let allow_list = allow_list.clone();
        match tokio::task::spawn_blocking(move || extract_image_metadata(&bytes, &allow_list)).await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(
                    subsystem = "extract",
                    component = "image",
                    error = %e,
                    "Image extraction task failed"
                );
                Metadata::default()
            }
        }
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Derive image metadata from in-memory bytes. Never fails; every field
/// that could not be derived is left unset.
pub fn extract_image_metadata(bytes: &[u8], allow_list: &AllowList) -> Metadata {
    let start = Instant::now();

    let (info, pixels) = match read_image(bytes) {
        Ok(read) => read,
        Err(e) => {
            warn!(
                subsystem = "extract",
                component = "image",
                byte_len = bytes.len(),
                error = %e,
                "Image container unreadable"
            );
            return Metadata::default();
        }
    };

    let mut metadata = Metadata::default();
    let mut sections = NestedMapping::new();
    let (mut width, mut height) = (info.width, info.height);

    if let Some(raw) = &info.exif {
        match decode_exif(raw) {
            Ok(exif) => {
                if exif
                    .orientation
                    .is_some_and(|o| o >= ORIENTATION_ROTATED_MIN)
                {
                    std::mem::swap(&mut width, &mut height);
                }
                for (name, section) in exif.into_sections() {
                    sections.insert(name.to_string(), JsonValue::Object(section));
                }
            }
            Err(e) => log_decode_failure(TagFormat::Exif, &e),
        }
    }

    if let Some(raw) = &info.icc {
        insert_section(
            &mut sections,
            TagFormat::Icc,
            decode_icc(raw).and_then(|p| p.to_mapping()),
        );
    }

    if let Some(raw) = &info.iptc {
        match decode_iptc(raw) {
            Ok(iptc) => {
                apply_iptc_fields(&mut metadata, &iptc);
                insert_section(&mut sections, TagFormat::Iptc, iptc.to_mapping());
            }
            Err(e) => log_decode_failure(TagFormat::Iptc, &e),
        }
    }

    if let Some(raw) = &info.xmp {
        insert_section(
            &mut sections,
            TagFormat::Xmp,
            decode_xmp(raw).and_then(|x| x.to_mapping()),
        );
    }

    metadata.width = (width > 0).then_some(width);
    metadata.height = (height > 0).then_some(height);

    let mut filtered = allow_list.filter(&sections);
    trim_strings(&mut filtered);
    let section_count = filtered.len();
    metadata.metadata = (!filtered.is_empty()).then_some(filtered);

    match pixels.and_then(|image| compute_thumbhash(&image)) {
        Ok(hash) => metadata.thumbhash = Some(hash),
        Err(e) => error!(
            subsystem = "extract",
            component = "image",
            error = %e,
            "Failed to compute thumbhash"
        ),
    }

    info!(
        subsystem = "extract",
        component = "image",
        format = ?info.format,
        width = ?metadata.width,
        height = ?metadata.height,
        section_count,
        duration_ms = start.elapsed().as_millis() as u64,
        "Image metadata extracted"
    );

    metadata
}

fn insert_section(sections: &mut NestedMapping, format: TagFormat, decoded: Result<NestedMapping>) {
    let Some(section) = format.section() else {
        return;
    };
    match decoded {
        Ok(mapping) if !mapping.is_empty() => {
            sections.insert(section.to_string(), JsonValue::Object(mapping));
        }
        Ok(_) => debug!(tag_format = %format, "Decoded block has no fields"),
        Err(e) => log_decode_failure(format, &e),
    }
}

fn log_decode_failure(format: TagFormat, error: &Error) {
    warn!(
        subsystem = "extract",
        component = "image",
        tag_format = %format,
        error = %error,
        "Failed to decode {} metadata, section omitted",
        format
    );
}

/// Surface IPTC caption, headline, and keywords as top-level fields.
fn apply_iptc_fields(metadata: &mut Metadata, iptc: &IptcData) {
    if let Some(caption) = &iptc.caption {
        metadata.description = Some(caption.clone());
    }
    if let Some(headline) = &iptc.headline {
        metadata.title = Some(headline.clone());
    }
    if !iptc.keywords.is_empty() {
        metadata.tags = Some(iptc.keywords.join(TAGS_SEPARATOR));
    }
}

/// Base64 ThumbHash of the image scaled to fit 100x100.
pub fn compute_thumbhash(image: &DynamicImage) -> Result<String> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Hash("image has no pixels".to_string()));
    }

    let rgba = if image.width() > THUMBHASH_MAX_DIMENSION || image.height() > THUMBHASH_MAX_DIMENSION
    {
        image
            .resize(
                THUMBHASH_MAX_DIMENSION,
                THUMBHASH_MAX_DIMENSION,
                FilterType::Triangle,
            )
            .to_rgba8()
    } else {
        image.to_rgba8()
    };

    let hash = thumbhash::rgba_to_thumb_hash(
        rgba.width() as usize,
        rgba.height() as usize,
        rgba.as_raw(),
    );
    Ok(base64::engine::general_purpose::STANDARD.encode(hash))
}
