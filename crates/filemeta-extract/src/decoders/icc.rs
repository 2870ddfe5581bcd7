//! ICC color profile decoding.
//!
//! Reads the fixed 128-byte profile header and the text tags from the tag
//! table (`desc`, `cprt`, `dmnd`, `dmdd`), handling the v2 `desc`/`text`
//! and v4 `mluc` encodings.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use filemeta_core::{Error, NestedMapping, Result};

use super::{to_mapping, TagFormat};

const HEADER_LEN: usize = 128;
const PROFILE_SIGNATURE: &[u8] = b"acsp";

/// Decoded ICC profile header and descriptive text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IccProfile {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering_intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_mfg_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model_description: Option<String>,
}

impl IccProfile {
    pub fn to_mapping(&self) -> Result<NestedMapping> {
        to_mapping(TagFormat::Icc, self)
    }
}

/// Decode a raw ICC profile.
pub fn decode_icc(profile: &[u8]) -> Result<IccProfile> {
    if profile.len() < HEADER_LEN {
        return Err(Error::decode(
            TagFormat::Icc.as_str(),
            format!("profile too short ({} bytes)", profile.len()),
        ));
    }
    if profile.get(36..40) != Some(PROFILE_SIGNATURE) {
        return Err(Error::decode(
            TagFormat::Icc.as_str(),
            "missing 'acsp' profile signature",
        ));
    }

    let tags = read_tag_table(profile);
    let text = |sig: &str| read_text_tag(profile, &tags, sig);

    Ok(IccProfile {
        version: read_version(profile),
        cmm: read_signature(profile, 4).map(map_vendor),
        device_class: read_signature(profile, 12).map(map_device_class),
        color_space: read_signature(profile, 16),
        connection_space: read_signature(profile, 20),
        date: read_date(profile, 24),
        platform: read_signature(profile, 40).map(map_vendor),
        manufacturer: read_signature(profile, 48).map(map_vendor),
        model: read_signature(profile, 52),
        rendering_intent: read_u32_be(profile, 64).map(map_rendering_intent),
        creator: read_signature(profile, 80).map(map_vendor),
        description: text("desc"),
        copyright: text("cprt"),
        device_mfg_description: text("dmnd"),
        device_model_description: text("dmdd"),
    })
}

fn read_u16_be(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Four-character signature; zero or blank signatures read as absent.
fn read_signature(data: &[u8], offset: usize) -> Option<String> {
    let slice = data.get(offset..offset + 4)?;
    let raw = String::from_utf8_lossy(slice);
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_version(data: &[u8]) -> String {
    let value = read_u32_be(data, 8).unwrap_or_default();
    let major = (value >> 24) & 0xFF;
    let minor = (value >> 20) & 0x0F;
    let bugfix = (value >> 16) & 0x0F;
    format!("{major}.{minor}.{bugfix}")
}

fn read_date(data: &[u8], offset: usize) -> Option<String> {
    let field = |i: usize| read_u16_be(data, offset + i * 2).map(u32::from);
    let date = NaiveDate::from_ymd_opt(field(0)? as i32, field(1)?, field(2)?)?;
    let datetime = date.and_hms_opt(field(3)?, field(4)?, field(5)?)?;
    Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn read_tag_table(profile: &[u8]) -> HashMap<String, (usize, usize)> {
    let mut tags = HashMap::new();
    let Some(count) = read_u32_be(profile, HEADER_LEN) else {
        return tags;
    };

    let mut offset = HEADER_LEN + 4;
    for _ in 0..count {
        let (Some(signature), Some(tag_offset), Some(tag_size)) = (
            read_signature(profile, offset),
            read_u32_be(profile, offset + 4),
            read_u32_be(profile, offset + 8),
        ) else {
            break;
        };
        tags.insert(signature, (tag_offset as usize, tag_size as usize));
        offset += 12;
    }
    tags
}

fn read_text_tag(
    profile: &[u8],
    tags: &HashMap<String, (usize, usize)>,
    signature: &str,
) -> Option<String> {
    let (offset, size) = *tags.get(signature)?;
    let data = profile.get(offset..offset.checked_add(size)?)?;
    let text = match read_signature(data, 0)?.as_str() {
        "desc" => parse_desc(data),
        "text" => parse_text(data),
        "mluc" => parse_mluc(data),
        _ => None,
    }?;
    (!text.is_empty()).then_some(text)
}

/// v2 `textDescriptionType`: ASCII count at 8, string at 12.
fn parse_desc(data: &[u8]) -> Option<String> {
    let length = read_u32_be(data, 8)? as usize;
    let end = 12usize.checked_add(length)?.min(data.len());
    let bytes = data.get(12..end)?;
    Some(clean_text(&String::from_utf8_lossy(bytes)))
}

/// v2 `textType`: ASCII from offset 8 to the end of the tag.
fn parse_text(data: &[u8]) -> Option<String> {
    let bytes = data.get(8..)?;
    Some(clean_text(&String::from_utf8_lossy(bytes)))
}

/// v4 `multiLocalizedUnicodeType`: first record, UTF-16BE.
fn parse_mluc(data: &[u8]) -> Option<String> {
    let count = read_u32_be(data, 8)?;
    let record_size = read_u32_be(data, 12)? as usize;
    if count == 0 || record_size < 12 {
        return None;
    }
    let length = read_u32_be(data, 16 + 4)? as usize;
    let offset = read_u32_be(data, 16 + 8)? as usize;
    let bytes = data.get(offset..offset.checked_add(length)?)?;
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).ok().map(|s| clean_text(&s))
}

fn clean_text(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

fn map_vendor(signature: String) -> String {
    match signature.as_str() {
        "APPL" => "Apple".to_string(),
        "MSFT" => "Microsoft".to_string(),
        "SGI" => "Silicon Graphics".to_string(),
        "SUNW" => "Sun Microsystems".to_string(),
        "ADBE" => "Adobe".to_string(),
        "lcms" => "Little CMS".to_string(),
        _ => signature,
    }
}

fn map_device_class(signature: String) -> String {
    match signature.as_str() {
        "scnr" => "Scanner".to_string(),
        "mntr" => "Monitor".to_string(),
        "prtr" => "Printer".to_string(),
        "link" => "Device link".to_string(),
        "spac" => "Color space".to_string(),
        "abst" => "Abstract".to_string(),
        "nmcl" => "Named color".to_string(),
        _ => signature,
    }
}

fn map_rendering_intent(intent: u32) -> String {
    match intent {
        0 => "Perceptual".to_string(),
        1 => "Relative colorimetric".to_string(),
        2 => "Saturation".to_string(),
        3 => "Absolute colorimetric".to_string(),
        _ => format!("Unknown ({intent})"),
    }
}
