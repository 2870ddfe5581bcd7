//! Centralized default constants for filemeta.
//!
//! **This module is the single source of truth** for shared default values.
//! Extractors, the embed resolver, and configuration loading reference these
//! constants instead of defining their own magic numbers.

// =============================================================================
// ALLOW LIST
// =============================================================================

/// Wildcard token that keeps every metadata section.
pub const ALLOW_LIST_WILDCARD: &str = "*";

/// Default allow-listed metadata sections (camera and capture settings only).
pub const FILE_METADATA_ALLOW_LIST: &[&str] = &["ifd0", "exif"];

// =============================================================================
// SUPPORTED FORMATS
// =============================================================================

/// MIME types eligible for metadata extraction when not overridden.
pub const SUPPORTED_FILE_METADATA_FORMATS: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/tiff",
    "image/bmp",
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-matroska",
    "video/ogg",
    "video/mpeg",
    "audio/mpeg",
    "audio/mp4",
    "audio/ogg",
    "audio/wav",
    "audio/x-wav",
    "audio/flac",
    "audio/aac",
    "audio/webm",
];

/// MIME prefix routed to the image extractor; everything else is probed.
pub const IMAGE_MIME_PREFIX: &str = "image/";

// =============================================================================
// IMAGE EXTRACTION
// =============================================================================

/// Bounding box (pixels) the image is resampled into before hashing.
pub const THUMBHASH_MAX_DIMENSION: u32 = 100;

/// EXIF orientation values at or above this indicate a 90°/270° rotation.
pub const ORIENTATION_ROTATED_MIN: u32 = 5;

/// Separator used when IPTC keywords are flattened into `tags`.
pub const TAGS_SEPARATOR: &str = ", ";

/// Largest binary EXIF value (bytes) kept in the metadata bag.
pub const EXIF_MAX_BINARY_LEN: usize = 64;

// =============================================================================
// MEDIA PROBE
// =============================================================================

/// Default media probe binary.
pub const FFPROBE_PATH: &str = "ffprobe";

/// Per-invocation timeout for the media probe process (seconds).
pub const FFPROBE_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// EMBED RESOLUTION
// =============================================================================

/// Browser-like User-Agent sent with oEmbed, page, and favicon requests.
///
/// Several providers only expose Open Graph tags or oEmbed links to
/// browsers, so the scrape identifies as one.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Timeout for each embed-related HTTP request (seconds).
pub const EMBED_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum page body size read during a scrape (2 MB).
pub const EMBED_MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

/// Well-known favicon path probed when the page declares none.
pub const FAVICON_WELL_KNOWN_PATH: &str = "/favicon.ico";

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// Environment variable holding the allow list (`*` or comma-separated sections).
pub const ENV_FILE_METADATA_ALLOW_LIST: &str = "FILE_METADATA_ALLOW_LIST";

/// Environment variable holding the comma-separated supported MIME types.
pub const ENV_SUPPORTED_FILE_METADATA_FORMATS: &str = "SUPPORTED_FILE_METADATA_FORMATS";

/// Environment variable overriding the media probe binary.
pub const ENV_FFPROBE_PATH: &str = "FFPROBE_PATH";

/// Environment variable overriding the media probe timeout.
pub const ENV_FFPROBE_TIMEOUT_SECS: &str = "FFPROBE_TIMEOUT_SECS";

/// Environment variable overriding the embed request timeout.
pub const ENV_EMBED_REQUEST_TIMEOUT_SECS: &str = "EMBED_REQUEST_TIMEOUT_SECS";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list_has_no_wildcard() {
        assert!(!FILE_METADATA_ALLOW_LIST.contains(&ALLOW_LIST_WILDCARD));
    }

    #[test]
    fn test_supported_formats_are_lowercase_mime_types() {
        for format in SUPPORTED_FILE_METADATA_FORMATS {
            assert!(format.contains('/'), "{format} is not a MIME type");
            assert_eq!(*format, format.to_lowercase());
        }
    }

    #[test]
    fn test_thumbhash_bound_within_library_limit() {
        // thumbhash encodes at most 100x100 inputs
        assert!(THUMBHASH_MAX_DIMENSION <= 100);
    }
}
