//! Minimal HTML tag extraction.
//!
//! Only `<meta>` and `<link>` are needed, so pages are scanned
//! with regular expressions instead of being parsed into a DOM. Attribute
//! names are lowercased and values are entity-decoded.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta regex"));

static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\s[^>]*>").expect("valid link regex"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid attribute regex")
});

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("valid entity regex")
});

/// Attributes of one tag, keyed by lowercase name.
pub type Attributes = HashMap<String, String>;

/// Parse the attributes of a single tag.
pub fn attributes(tag: &str) -> Attributes {
    ATTRIBUTE
        .captures_iter(tag)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (name, decode_entities(value.trim()))
        })
        .collect()
}

/// `(key, content)` pairs from every `<meta>` tag, in document order.
///
/// The key is the lowercased `property`, falling back to `name` and then
/// `itemprop`.
pub fn meta_tags(html: &str) -> Vec<(String, String)> {
    META_TAG
        .find_iter(html)
        .filter_map(|m| {
            let mut attrs = attributes(m.as_str());
            let key = attrs
                .remove("property")
                .or_else(|| attrs.remove("name"))
                .or_else(|| attrs.remove("itemprop"))?;
            let content = attrs.remove("content")?;
            Some((key.trim().to_ascii_lowercase(), content))
        })
        .collect()
}

/// Attributes of every `<link>` tag, in document order.
pub fn link_tags(html: &str) -> Vec<Attributes> {
    LINK_TAG
        .find_iter(html)
        .map(|m| attributes(m.as_str()))
        .collect()
}

/// Whether a link's space-separated `rel` contains `wanted`.
pub fn has_rel(link: &Attributes, wanted: &str) -> bool {
    link.get("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case(wanted))
    })
}

/// Decode named and numeric character references.
///
/// Unknown named references are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            decode_entity(body).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let c = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "euro" => '\u{20ac}',
        "pound" => '\u{a3}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        _ => return None,
    };
    Some(c.to_string())
}
