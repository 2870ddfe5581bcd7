//! Binary tag decoders.
//!
//! Each decoder is a pure function from a raw block to its own structured
//! record. Records are converted to a [`NestedMapping`] only when the
//! extractor assembles sections, so a failure in one format never affects
//! another.

pub mod exif;
pub mod icc;
pub mod iptc;
pub mod xmp;

use serde::Serialize;
use serde_json::Value as JsonValue;

use filemeta_core::{Error, NestedMapping, Result};

pub use self::exif::{decode_exif, ExifData};
pub use self::icc::{decode_icc, IccProfile};
pub use self::iptc::{decode_iptc, IptcData};
pub use self::xmp::{decode_xmp, XmpData};

/// The embedded tag formats understood by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFormat {
    Exif,
    Icc,
    Iptc,
    Xmp,
}

impl TagFormat {
    /// Name used in log and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TagFormat::Exif => "EXIF",
            TagFormat::Icc => "ICC",
            TagFormat::Iptc => "IPTC",
            TagFormat::Xmp => "XMP",
        }
    }

    /// Top-level metadata section the decoded record is stored under.
    ///
    /// EXIF fans out into several sections and has no single key.
    pub fn section(&self) -> Option<&'static str> {
        match self {
            TagFormat::Exif => None,
            TagFormat::Icc => Some("icc"),
            TagFormat::Iptc => Some("iptc"),
            TagFormat::Xmp => Some("xmp"),
        }
    }
}

impl std::fmt::Display for TagFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialize a decoded record into a mapping.
pub(crate) fn to_mapping<T: Serialize>(format: TagFormat, value: &T) -> Result<NestedMapping> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::decode(
            format.as_str(),
            format!("record serialized to non-object: {}", other),
        )),
    }
}
