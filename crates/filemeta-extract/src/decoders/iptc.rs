//! IPTC-IIM decoding.
//!
//! Decodes Record 2 (Application Record) datasets into named fields. The
//! input may be raw IIM bytes or a Photoshop image resource block
//! (`Photoshop 3.0\0` / `8BIM` entries), in which case resource 0x0404 is
//! unwrapped first.
//!
//! IIM dataset layout:
//!   Byte 0:    0x1C (tag marker)
//!   Byte 1:    Record number
//!   Byte 2:    Dataset number
//!   Bytes 3-4: Data length (big-endian u16)
//!   Bytes 5+:  Data

use serde::Serialize;

use filemeta_core::{Error, NestedMapping, Result};

use super::{to_mapping, TagFormat};

pub(crate) const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const TAG_MARKER: u8 = 0x1C;
const ENVELOPE_RECORD: u8 = 1;
const CODED_CHARACTER_SET: u8 = 90;
const APPLICATION_RECORD: u8 = 2;
/// ISO 2022 escape sequence declaring UTF-8 in dataset 1:90.
const UTF8_ESCAPE: &[u8] = b"\x1b%G";

/// Named IPTC Application Record fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IptcData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supplemental_categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byline_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province_or_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_writer: Option<String>,
}

impl IptcData {
    pub fn is_empty(&self) -> bool {
        self == &IptcData::default()
    }

    pub fn to_mapping(&self) -> Result<NestedMapping> {
        to_mapping(TagFormat::Iptc, self)
    }

    fn set(&mut self, dataset: u8, value: String) {
        let slot = match dataset {
            5 => &mut self.object_name,
            10 => &mut self.urgency,
            15 => &mut self.category,
            20 => return self.supplemental_categories.push(value),
            25 => return self.keywords.push(value),
            40 => &mut self.special_instructions,
            55 => &mut self.date_created,
            60 => &mut self.time_created,
            80 => &mut self.byline,
            85 => &mut self.byline_title,
            90 => &mut self.city,
            92 => &mut self.sub_location,
            95 => &mut self.province_or_state,
            100 => &mut self.country_code,
            101 => &mut self.country_name,
            105 => &mut self.headline,
            110 => &mut self.credit,
            115 => &mut self.source,
            116 => &mut self.copyright_notice,
            120 => &mut self.caption,
            122 => &mut self.caption_writer,
            _ => return,
        };
        slot.get_or_insert(value);
    }
}

/// Decode an IPTC block (raw IIM or Photoshop resources).
pub fn decode_iptc(raw: &[u8]) -> Result<IptcData> {
    let iim = if raw.starts_with(PHOTOSHOP_HEADER) || raw.starts_with(BIM_MARKER) {
        extract_iptc_from_8bim(raw).ok_or_else(|| {
            Error::decode(
                TagFormat::Iptc.as_str(),
                "no IPTC resource in Photoshop block",
            )
        })?
    } else {
        raw
    };

    let data = parse_iim(iim);
    if data.is_empty() {
        return Err(Error::decode(
            TagFormat::Iptc.as_str(),
            "no application record datasets",
        ));
    }
    Ok(data)
}

/// Decode a dataset value.
///
/// Without a UTF-8 declaration in 1:90, values that are not valid UTF-8
/// are read as Latin-1, the usual encoding of older IIM writers.
fn decode_text(bytes: &[u8], declared_utf8: bool) -> String {
    if declared_utf8 {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn parse_iim(data: &[u8]) -> IptcData {
    let mut result = IptcData::default();
    let mut declared_utf8 = false;
    let mut pos = 0;

    while pos + 5 <= data.len() {
        if data[pos] != TAG_MARKER {
            pos += 1;
            continue;
        }

        let record = data[pos + 1];
        let dataset = data[pos + 2];
        let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        pos += 5;

        if pos + length > data.len() {
            break;
        }

        let bytes = &data[pos..pos + length];
        if record == ENVELOPE_RECORD && dataset == CODED_CHARACTER_SET {
            declared_utf8 = bytes == UTF8_ESCAPE;
        } else if record == APPLICATION_RECORD {
            let value = decode_text(bytes, declared_utf8).trim().to_string();
            if !value.is_empty() {
                result.set(dataset, value);
            }
        }

        pos += length;
    }

    result
}

/// Extract IPTC-IIM bytes from a Photoshop 8BIM resource block.
pub(crate) fn extract_iptc_from_8bim(segment: &[u8]) -> Option<&[u8]> {
    let data = segment.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(segment);

    let mut pos = 0;
    while pos + 12 <= data.len() {
        // "8BIM" (4) + resource_id (2) + pascal_string + data_len (4) + data
        if &data[pos..pos + 4] != BIM_MARKER {
            pos += 1;
            continue;
        }
        pos += 4;

        let resource_id = u16::from_be_bytes([data[pos], data[pos + 1]]);
        pos += 2;

        // Pascal string: 1 byte length + string, padded to even total
        let pascal_len = data[pos] as usize;
        pos += 1 + pascal_len + ((1 + pascal_len) % 2);

        if pos + 4 > data.len() {
            break;
        }
        let res_len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;

        if pos + res_len > data.len() {
            break;
        }

        if resource_id == IPTC_RESOURCE_ID {
            return Some(&data[pos..pos + res_len]);
        }

        pos += res_len + (res_len % 2);
    }

    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn dataset(number: u8, value: &str) -> Vec<u8> {
        let mut out = vec![TAG_MARKER, APPLICATION_RECORD, number];
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
        out
    }

    /// Wrap IIM bytes in a Photoshop 3.0 resource block.
    pub(crate) fn photoshop_block(iim: &[u8]) -> Vec<u8> {
        let mut out = PHOTOSHOP_HEADER.to_vec();
        out.extend_from_slice(BIM_MARKER);
        out.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
        out.extend_from_slice(&[0, 0]); // empty pascal name, padded
        out.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        out.extend_from_slice(iim);
        if iim.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    #[test]
    fn test_parse_named_datasets() {
        let mut iim = dataset(105, "Headline here");
        iim.extend(dataset(120, "  A caption  "));
        iim.extend(dataset(25, "snow"));
        iim.extend(dataset(25, "winter"));
        iim.extend(dataset(80, "Jane Doe"));

        let data = decode_iptc(&iim).unwrap();
        assert_eq!(data.headline.as_deref(), Some("Headline here"));
        assert_eq!(data.caption.as_deref(), Some("A caption"));
        assert_eq!(data.keywords, vec!["snow", "winter"]);
        assert_eq!(data.byline.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_first_value_wins_for_single_fields() {
        let mut iim = dataset(5, "First");
        iim.extend(dataset(5, "Second"));
        let data = decode_iptc(&iim).unwrap();
        assert_eq!(data.object_name.as_deref(), Some("First"));
    }

    #[test]
    fn test_decode_photoshop_block() {
        let block = photoshop_block(&dataset(120, "Wrapped"));
        let data = decode_iptc(&block).unwrap();
        assert_eq!(data.caption.as_deref(), Some("Wrapped"));
    }

    #[test]
    fn test_skips_non_application_record() {
        let data = [0x1C, 0x01, 0x05, 0x00, 0x03, b'f', b'o', b'o'];
        assert!(decode_iptc(&data).is_err());
    }

    #[test]
    fn test_empty_block_fails() {
        assert!(decode_iptc(&[]).is_err());
    }

    #[test]
    fn test_to_mapping_names() {
        let mut iim = dataset(105, "H");
        iim.extend(dataset(85, "Staff"));
        iim.extend(dataset(25, "k"));
        let mapping = decode_iptc(&iim).unwrap().to_mapping().unwrap();
        assert_eq!(mapping["Headline"], "H");
        assert_eq!(mapping["BylineTitle"], "Staff");
        assert_eq!(mapping["Keywords"], serde_json::json!(["k"]));
        assert!(!mapping.contains_key("Caption"));
    }

    fn raw_dataset(record: u8, number: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![TAG_MARKER, record, number];
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn test_undeclared_charset_falls_back_to_latin1() {
        // "Café São" in ISO-8859-1
        let mut iim = raw_dataset(APPLICATION_RECORD, 120, b"Caf\xe9 S\xe3o");
        iim.extend(raw_dataset(APPLICATION_RECORD, 25, b"m\xfcnchen"));
        let data = decode_iptc(&iim).unwrap();
        assert_eq!(data.caption.as_deref(), Some("Caf\u{e9} S\u{e3}o"));
        assert_eq!(data.keywords, vec!["m\u{fc}nchen"]);
    }

    #[test]
    fn test_undeclared_charset_keeps_valid_utf8() {
        let data = decode_iptc(&dataset(105, "Z\u{fc}rich")).unwrap();
        assert_eq!(data.headline.as_deref(), Some("Z\u{fc}rich"));
    }

    #[test]
    fn test_declared_utf8_charset() {
        let mut iim = raw_dataset(ENVELOPE_RECORD, CODED_CHARACTER_SET, UTF8_ESCAPE);
        iim.extend(dataset(105, "\u{e9}t\u{e9}"));
        iim.extend(raw_dataset(APPLICATION_RECORD, 120, b"bad \xe9"));
        let data = decode_iptc(&iim).unwrap();
        assert_eq!(data.headline.as_deref(), Some("\u{e9}t\u{e9}"));
        assert_eq!(data.caption.as_deref(), Some("bad \u{fffd}"));
    }

    #[test]
    fn test_truncated_dataset_stops_parsing() {
        let mut iim = dataset(5, "ok");
        iim.extend_from_slice(&[0x1C, 0x02, 0x78, 0x00, 0xFF, b'x']);
        let data = decode_iptc(&iim).unwrap();
        assert_eq!(data.object_name.as_deref(), Some("ok"));
        assert!(data.caption.is_none());
    }
}
