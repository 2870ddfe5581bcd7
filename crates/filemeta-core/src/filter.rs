//! Allow-list filtering for nested metadata.
//!
//! The allow list restricts which top-level sections of a [`NestedMapping`]
//! survive extraction. Filtering is shallow: a kept section is carried over
//! verbatim, a dropped section disappears entirely.
//!
//! # Example
//!
//! ```
//! use filemeta_core::filter::AllowList;
//! use serde_json::json;
//!
//! let allow: AllowList = "ifd0,exif".parse().unwrap();
//! let data = json!({ "ifd0": { "Make": "Canon" }, "gps": { "GPSLatitude": 1.0 } });
//! let filtered = allow.filter(data.as_object().unwrap());
//!
//! assert!(filtered.contains_key("ifd0"));
//! assert!(!filtered.contains_key("gps"));
//! ```

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::defaults::{ALLOW_LIST_WILDCARD, FILE_METADATA_ALLOW_LIST};
use crate::models::NestedMapping;

/// Which metadata sections are retained in output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    /// Keep every section.
    All,
    /// Keep only these sections, in configuration order.
    Sections(Vec<String>),
}

impl AllowList {
    /// Build an explicit section list.
    pub fn sections<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut kept: Vec<String> = Vec::new();
        for section in sections {
            let section = section.into();
            if !kept.contains(&section) {
                kept.push(section);
            }
        }
        AllowList::Sections(kept)
    }

    /// Whether a top-level section passes this allow list.
    pub fn allows(&self, section: &str) -> bool {
        match self {
            AllowList::All => true,
            AllowList::Sections(sections) => sections.iter().any(|s| s == section),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, AllowList::All)
    }

    /// Project `data` down to the allowed top-level sections.
    ///
    /// The wildcard returns `data` unchanged. Section values are never
    /// inspected, so nested keys that happen to share a section name are
    /// unaffected.
    pub fn filter(&self, data: &NestedMapping) -> NestedMapping {
        match self {
            AllowList::All => data.clone(),
            AllowList::Sections(_) => data
                .iter()
                .filter(|(key, _)| self.allows(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

impl Default for AllowList {
    fn default() -> Self {
        AllowList::sections(FILE_METADATA_ALLOW_LIST.iter().copied())
    }
}

impl FromStr for AllowList {
    type Err = Infallible;

    /// Parses `*` as the wildcard, anything else as a comma-separated list.
    /// Blank entries are ignored; a `*` anywhere in the list wins.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect();

        if entries.contains(&ALLOW_LIST_WILDCARD) {
            return Ok(AllowList::All);
        }
        Ok(AllowList::sections(entries))
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowList::All => write!(f, "{}", ALLOW_LIST_WILDCARD),
            AllowList::Sections(sections) => write!(f, "{}", sections.join(",")),
        }
    }
}

impl Serialize for AllowList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AllowList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.parse().unwrap_or_default(),
            Raw::List(list) if list.iter().any(|s| s == ALLOW_LIST_WILDCARD) => AllowList::All,
            Raw::List(list) => AllowList::sections(list),
        })
    }
}

/// Trim surrounding whitespace from every string leaf, recursively.
///
/// Tag decoders frequently return padded or NUL-terminated strings.
pub fn trim_strings(data: &mut NestedMapping) {
    for value in data.values_mut() {
        trim_value(value);
    }
}

fn trim_value(value: &mut JsonValue) {
    match value {
        JsonValue::String(s) => {
            let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        JsonValue::Array(items) => items.iter_mut().for_each(trim_value),
        JsonValue::Object(map) => map.values_mut().for_each(trim_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NestedMapping {
        json!({
            "ifd0": { "Make": "Canon", "Model": "EOS" },
            "exif": { "FNumber": 2.8 },
            "gps": { "GPSLatitude": 52.1 },
            "icc": { "description": "sRGB" }
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_wildcard_is_identity() {
        let data = sample();
        assert_eq!(AllowList::All.filter(&data), data);
    }

    #[test]
    fn test_sections_keep_only_intersection() {
        let allow = AllowList::sections(["exif", "gps", "xmp"]);
        let filtered = allow.filter(&sample());
        let keys: Vec<&str> = filtered.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["exif", "gps"]);
    }

    #[test]
    fn test_filter_preserves_data_order_not_allow_order() {
        let allow = AllowList::sections(["icc", "ifd0"]);
        let filtered = allow.filter(&sample());
        let keys: Vec<&str> = filtered.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ifd0", "icc"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let allow = AllowList::sections(["ifd0", "gps"]);
        let once = allow.filter(&sample());
        let twice = allow.filter(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_never_recurses() {
        let data = json!({ "ifd0": { "exif": "nested", "Make": "Canon" } })
            .as_object()
            .unwrap()
            .clone();
        let filtered = AllowList::sections(["ifd0"]).filter(&data);
        assert_eq!(filtered["ifd0"]["exif"], "nested");
        assert_eq!(filtered["ifd0"]["Make"], "Canon");
    }

    #[test]
    fn test_empty_sections_drop_everything() {
        let filtered = AllowList::sections(Vec::<String>::new()).filter(&sample());
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_parse_wildcard() {
        assert_eq!("*".parse::<AllowList>().unwrap(), AllowList::All);
        assert_eq!(" ifd0 , * ".parse::<AllowList>().unwrap(), AllowList::All);
    }

    #[test]
    fn test_parse_comma_list() {
        let allow: AllowList = "ifd0, exif,,gps,exif".parse().unwrap();
        assert_eq!(allow, AllowList::sections(["ifd0", "exif", "gps"]));
        assert_eq!(allow.to_string(), "ifd0,exif,gps");
    }

    #[test]
    fn test_default_allow_list() {
        let allow = AllowList::default();
        assert!(allow.allows("ifd0"));
        assert!(allow.allows("exif"));
        assert!(!allow.allows("gps"));
    }

    #[test]
    fn test_deserialize_from_string_and_list() {
        let from_text: AllowList = serde_json::from_value(json!("icc,iptc")).unwrap();
        assert_eq!(from_text, AllowList::sections(["icc", "iptc"]));

        let from_list: AllowList = serde_json::from_value(json!(["xmp"])).unwrap();
        assert_eq!(from_list, AllowList::sections(["xmp"]));

        let wildcard: AllowList = serde_json::from_value(json!(["*"])).unwrap();
        assert_eq!(wildcard, AllowList::All);
    }

    #[test]
    fn test_trim_strings_recurses_into_values() {
        let mut data = json!({
            "ifd0": { "Make": "  Canon\0\0", "Tags": [" a ", "b "] },
            "exif": { "ISO": 100 }
        })
        .as_object()
        .unwrap()
        .clone();

        trim_strings(&mut data);

        assert_eq!(data["ifd0"]["Make"], "Canon");
        assert_eq!(data["ifd0"]["Tags"], json!(["a", "b"]));
        assert_eq!(data["exif"]["ISO"], 100);
    }
}
