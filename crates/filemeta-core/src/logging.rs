//! Structured logging schema and field name constants for filemeta.
//!
//! All crates use these constants as `tracing` field names so log
//! aggregation can query extraction and embed events uniformly.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Whole-source degradation (probe failed, hash failed) |
//! | WARN  | Recoverable issue, section or source dropped |
//! | INFO  | Operation completions |
//! | DEBUG | Decision points, routing, skipped inputs |
//! | TRACE | Per-item iteration (favicon candidates, tags) |
//!
//! The library never installs a subscriber; the host application owns that.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "extract", "embed"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "image", "probe", "dispatcher", "oembed", "scrape", "favicon"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Declared MIME type of the file being extracted.
pub const MIME_TYPE: &str = "mime_type";

/// Storage file name of the file being extracted.
pub const FILENAME: &str = "filename";

/// Binary tag format being decoded ("EXIF", "ICC", "IPTC", "XMP").
pub const TAG_FORMAT: &str = "tag_format";

/// URL being resolved or fetched.
pub const URL: &str = "url";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of metadata sections kept after filtering.
pub const SECTION_COUNT: &str = "section_count";

/// Byte length of an input stream or response body.
pub const BYTE_LEN: &str = "byte_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
