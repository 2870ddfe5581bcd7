//! # filemeta-extract
//!
//! File metadata extraction for filemeta.
//!
//! This crate provides:
//! - Binary tag decoders for EXIF, ICC, IPTC, and XMP blocks
//! - Container scanning for JPEG, PNG, WebP, and TIFF
//! - Image extraction with orientation correction and ThumbHash
//! - Media probing for audio and video through ffprobe
//! - A dispatcher that routes by MIME type and never clobbers caller values
//!
//! ## Example
//!
//! ```no_run
//! use filemeta_extract::{FileRecord, LocalStreamSource, MetadataDispatcher};
//!
//! # async fn run() {
//! let source = LocalStreamSource::new().with_location("local", "/srv/uploads");
//! let dispatcher = MetadataDispatcher::from_env();
//!
//! let record = FileRecord::new("local", "holiday.jpg");
//! let metadata = dispatcher.extract(&record, &source, "image/jpeg").await;
//! println!("{:?}x{:?}", metadata.width, metadata.height);
//! # }
//! ```

pub mod container;
pub mod decoders;
pub mod dispatcher;
pub mod imaging;
pub mod probe;

// Re-export core types
pub use filemeta_core::*;

pub use container::{read_image, scan_blocks, ContainerInfo, ScannedBlocks};
pub use decoders::{
    decode_exif, decode_icc, decode_iptc, decode_xmp, ExifData, IccProfile, IptcData, TagFormat,
    XmpData,
};
pub use dispatcher::{overlay, MetadataDispatcher};
pub use imaging::{compute_thumbhash, extract_image_metadata, ImageExtractor};
pub use probe::{
    metadata_from_report, FfprobeProber, MediaProber, ProbeExtractor, ProbeFormat, ProbeReport,
    ProbeStream,
};
