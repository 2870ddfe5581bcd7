//! oEmbed discovery and descriptor parsing.
//!
//! The page advertises its descriptor through
//! `<link rel="alternate" type="application/json+oembed" href="...">` (or
//! `text/xml+oembed`). JSON descriptors are preferred when both exist.

use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;
use url::Url;
use xmltree::{Element, XMLNode};

use filemeta_core::{Error, NestedMapping, Result};

use crate::client::EmbedClient;
use crate::html::{has_rel, link_tags};

const JSON_OEMBED: &str = "application/json+oembed";
const XML_OEMBED: &str = "text/xml+oembed";

/// Descriptor encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OEmbedFormat {
    Json,
    Xml,
}

/// A discovered descriptor endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OEmbedLink {
    pub url: Url,
    pub format: OEmbedFormat,
}

/// A parsed oEmbed descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OEmbed {
    fields: NestedMapping,
}

impl OEmbed {
    pub fn new(fields: NestedMapping) -> Self {
        Self { fields }
    }

    /// The descriptor's `type` (`video`, `photo`, `rich`, `link`).
    pub fn kind(&self) -> Option<&str> {
        self.text("type")
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &NestedMapping {
        &self.fields
    }

    pub fn into_fields(self) -> NestedMapping {
        self.fields
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Find the page's oEmbed endpoint, resolved against `base`.
pub fn discover(html: &str, base: &Url) -> Option<OEmbedLink> {
    let mut xml = None;
    for link in link_tags(html) {
        if !has_rel(&link, "alternate") {
            continue;
        }
        let (Some(kind), Some(href)) = (link.get("type"), link.get("href")) else {
            continue;
        };
        let format = if kind.eq_ignore_ascii_case(JSON_OEMBED) {
            OEmbedFormat::Json
        } else if kind.eq_ignore_ascii_case(XML_OEMBED) {
            OEmbedFormat::Xml
        } else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            debug!(href = %href, "Ignoring unparseable oEmbed href");
            continue;
        };

        match format {
            OEmbedFormat::Json => return Some(OEmbedLink { url, format }),
            OEmbedFormat::Xml if xml.is_none() => xml = Some(OEmbedLink { url, format }),
            OEmbedFormat::Xml => {}
        }
    }
    xml
}

/// Parse a JSON descriptor.
pub fn parse_json(body: &str) -> Result<OEmbed> {
    match serde_json::from_str::<JsonValue>(body)? {
        JsonValue::Object(fields) => Ok(OEmbed::new(fields)),
        _ => Err(Error::InvalidInput(
            "oEmbed JSON is not an object".to_string(),
        )),
    }
}

/// Parse an XML descriptor (`<oembed>` with one child per field).
pub fn parse_xml(body: &str) -> Result<OEmbed> {
    let root = Element::parse(body.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("Invalid oEmbed XML: {}", e)))?;
    if root.name != "oembed" {
        return Err(Error::InvalidInput(format!(
            "Unexpected oEmbed root element <{}>",
            root.name
        )));
    }

    let mut fields = Map::new();
    for node in &root.children {
        let XMLNode::Element(child) = node else {
            continue;
        };
        let text = child
            .get_text()
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        fields.insert(child.name.clone(), xml_field_value(&child.name, text));
    }
    Ok(OEmbed::new(fields))
}

/// Numeric oEmbed fields are typed as numbers, as in JSON descriptors.
fn xml_field_value(name: &str, text: String) -> JsonValue {
    let numeric = name.ends_with("width") || name.ends_with("height") || name == "cache_age";
    if numeric {
        if let Ok(n) = text.parse::<u64>() {
            return JsonValue::Number(Number::from(n));
        }
    }
    JsonValue::String(text)
}

/// Discover and fetch the oEmbed descriptor for a page.
///
/// A page without a discovery link yields `Ok(None)`.
pub async fn fetch_oembed(client: &EmbedClient, page_url: &Url) -> Result<Option<OEmbed>> {
    let page = client.fetch_text(page_url).await?;
    let Some(link) = discover(&page.body, &page.url) else {
        debug!(url = %page_url, "No oEmbed discovery link");
        return Ok(None);
    };

    debug!(url = %page_url, endpoint = %link.url, format = ?link.format, "Fetching oEmbed descriptor");
    let descriptor = client.fetch_text(&link.url).await?;
    let oembed = match link.format {
        OEmbedFormat::Json => parse_json(&descriptor.body)?,
        OEmbedFormat::Xml => parse_xml(&descriptor.body)?,
    };
    Ok(Some(oembed))
}
