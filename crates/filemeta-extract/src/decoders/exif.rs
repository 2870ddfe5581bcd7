//! EXIF block decoding.
//!
//! Parses a raw TIFF-structured EXIF block using the kamadak-exif crate and
//! fans the fields out into the five IFD-based sections:
//! - `ifd0`: primary image tags
//! - `ifd1`: thumbnail image tags
//! - `exif`: photographic tags (exposure, lens, ISO, ...)
//! - `gps`: GPS tags
//! - `interop`: interoperability tags
//!
//! Tag names are the library's canonical names (`Make`, `FNumber`, ...).

use exif::{Context, Field, In, Reader, Tag, Value};
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use filemeta_core::defaults::EXIF_MAX_BINARY_LEN;
use filemeta_core::{Error, NestedMapping, Result};

use super::TagFormat;

/// Header some containers (JPEG APP1, some WebP writers) keep in front of
/// the TIFF structure.
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Decoded EXIF sections plus the primary orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    pub ifd0: NestedMapping,
    pub ifd1: NestedMapping,
    pub exif: NestedMapping,
    pub gps: NestedMapping,
    pub interop: NestedMapping,
    /// Primary image `Orientation` (1-8).
    pub orientation: Option<u32>,
}

impl ExifData {
    /// Non-empty sections in output order.
    pub fn into_sections(self) -> Vec<(&'static str, NestedMapping)> {
        [
            ("ifd0", self.ifd0),
            ("ifd1", self.ifd1),
            ("exif", self.exif),
            ("gps", self.gps),
            ("interop", self.interop),
        ]
        .into_iter()
        .filter(|(_, section)| !section.is_empty())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ifd0.is_empty()
            && self.ifd1.is_empty()
            && self.exif.is_empty()
            && self.gps.is_empty()
            && self.interop.is_empty()
    }
}

/// Decode a raw EXIF block.
///
/// Malformed individual fields are skipped and logged; only a block whose
/// TIFF structure cannot be read at all is an error.
pub fn decode_exif(raw: &[u8]) -> Result<ExifData> {
    let tiff = raw.strip_prefix(EXIF_HEADER).unwrap_or(raw);
    let mut reader = Reader::new();
    reader.continue_on_error(true);
    let exif = reader
        .read_raw(tiff.to_vec())
        .or_else(|e| {
            e.distill_partial_result(|errors| {
                for error in &errors {
                    warn!(
                        subsystem = "extract",
                        component = "exif",
                        error = %error,
                        "Skipping malformed EXIF field"
                    );
                }
            })
        })
        .map_err(|e| Error::decode(TagFormat::Exif.as_str(), e.to_string()))?;

    let mut data = ExifData {
        orientation: exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0)),
        ..Default::default()
    };

    for field in exif.fields() {
        if is_pointer_tag(field.tag) {
            continue;
        }
        let Some(value) = field_to_json(field) else {
            continue;
        };

        let section = match (field.tag.context(), field.ifd_num) {
            (Context::Tiff, In::PRIMARY) => &mut data.ifd0,
            (Context::Tiff, _) => &mut data.ifd1,
            (Context::Exif, _) => &mut data.exif,
            (Context::Gps, _) => &mut data.gps,
            (Context::Interop, _) => &mut data.interop,
            _ => continue,
        };
        section.entry(field.tag.to_string()).or_insert(value);
    }

    Ok(data)
}

/// Offsets to sub-IFDs carry no information once the IFDs are parsed.
fn is_pointer_tag(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::ExifIFDPointer | Tag::GPSInfoIFDPointer | Tag::InteropIFDPointer
    )
}

/// Convert a field's value to JSON. Single-element values collapse to a
/// scalar; large binary blobs are dropped.
fn field_to_json(field: &Field) -> Option<JsonValue> {
    match &field.value {
        Value::Ascii(vecs) => {
            let strings: Vec<String> = vecs
                .iter()
                .map(|v| String::from_utf8_lossy(v).trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            match strings.len() {
                0 => None,
                1 => strings.into_iter().next().map(JsonValue::String),
                _ => Some(json!(strings)),
            }
        }
        Value::Byte(v) => small_binary(v).then(|| one_or_many(v)),
        Value::SByte(v) => small_binary(v).then(|| one_or_many(v)),
        Value::Short(v) => Some(one_or_many(v)),
        Value::SShort(v) => Some(one_or_many(v)),
        Value::Long(v) => Some(one_or_many(v)),
        Value::SLong(v) => Some(one_or_many(v)),
        Value::Float(v) => Some(one_or_many(v)),
        Value::Double(v) => Some(one_or_many(v)),
        Value::Rational(v) => {
            let floats: Vec<f64> = v.iter().map(|r| r.to_f64()).collect();
            Some(one_or_many(&floats))
        }
        Value::SRational(v) => {
            let floats: Vec<f64> = v.iter().map(|r| r.to_f64()).collect();
            Some(one_or_many(&floats))
        }
        Value::Undefined(bytes, _) => {
            small_binary(bytes).then(|| JsonValue::String(field.display_value().to_string()))
        }
        _ => None,
    }
}

fn small_binary<T>(values: &[T]) -> bool {
    !values.is_empty() && values.len() <= EXIF_MAX_BINARY_LEN
}

fn one_or_many<T>(values: &[T]) -> JsonValue
where
    T: Copy + Into<JsonValue>,
{
    match values {
        [single] => (*single).into(),
        _ => JsonValue::Array(values.iter().map(|v| (*v).into()).collect()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Big-endian TIFF block with IFD0 entries `(tag, type, count, value)`.
    /// Values must fit in the 4-byte offset field.
    pub(crate) fn tiff_block(entries: &[(u16, u16, u32, [u8; 4])]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"MM\0\x2a");
        out.extend_from_slice(&8u32.to_be_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        for (tag, typ, count, value) in entries {
            out.extend_from_slice(&tag.to_be_bytes());
            out.extend_from_slice(&typ.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
            out.extend_from_slice(value);
        }
        out.extend_from_slice(&0u32.to_be_bytes());
        out
    }

    /// EXIF block carrying only an `Orientation` tag.
    pub(crate) fn orientation_block(orientation: u16) -> Vec<u8> {
        let v = orientation.to_be_bytes();
        tiff_block(&[(0x0112, 3, 1, [v[0], v[1], 0, 0])])
    }

    #[test]
    fn test_decode_orientation() {
        let data = decode_exif(&orientation_block(6)).unwrap();
        assert_eq!(data.orientation, Some(6));
        assert_eq!(data.ifd0["Orientation"], 6);
        assert!(data.exif.is_empty());
    }

    #[test]
    fn test_decode_strips_exif_header() {
        let mut raw = EXIF_HEADER.to_vec();
        raw.extend(orientation_block(3));
        let data = decode_exif(&raw).unwrap();
        assert_eq!(data.orientation, Some(3));
    }

    #[test]
    fn test_decode_ascii_tag() {
        // Make = "Acme" (4 chars + NUL would not fit; count 4 without NUL)
        let block = tiff_block(&[(0x010F, 2, 4, *b"Acme")]);
        let data = decode_exif(&block).unwrap();
        assert_eq!(data.ifd0["Make"], "Acme");
    }

    /// IFD0 with a valid `Orientation` and a `Make` whose value offset
    /// points past the end of the block.
    pub(crate) fn truncated_make_block(orientation: u16) -> Vec<u8> {
        let v = orientation.to_be_bytes();
        tiff_block(&[
            (0x010F, 2, 40, 0x0100u32.to_be_bytes()),
            (0x0112, 3, 1, [v[0], v[1], 0, 0]),
        ])
    }

    #[test]
    fn test_truncated_field_keeps_remaining_fields() {
        let data = decode_exif(&truncated_make_block(6)).unwrap();
        assert_eq!(data.orientation, Some(6));
        assert_eq!(data.ifd0["Orientation"], 6);
        assert!(!data.ifd0.contains_key("Make"));
    }

    #[test]
    fn test_into_sections_skips_empty() {
        let data = decode_exif(&orientation_block(1)).unwrap();
        let sections = data.into_sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, "ifd0");
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_exif(&[0u8; 16]).unwrap_err();
        assert!(err.to_string().starts_with("EXIF decode error"));
    }

    #[test]
    fn test_decode_empty_fails() {
        assert!(decode_exif(&[]).is_err());
    }

    #[test]
    fn test_one_or_many() {
        assert_eq!(one_or_many(&[7u16]), json!(7));
        assert_eq!(one_or_many(&[1u32, 2, 3]), json!([1, 2, 3]));
    }
}
