//! XMP packet decoding.
//!
//! Locates the `<x:xmpmeta>` (or bare `<rdf:RDF>`) packet, parses it with
//! xmltree, and flattens every `rdf:Description` into one property map
//! keyed by local name. Properties may be written as attributes or as
//! child elements; `rdf:Alt` yields its first item, `rdf:Bag`/`rdf:Seq`
//! yield lists, and structured values become nested objects.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use xmltree::{Element, XMLNode};

use filemeta_core::{Error, NestedMapping, Result};

use super::{to_mapping, TagFormat};

/// Decoded XMP properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct XmpData {
    /// `x:xmptk` of the writing toolkit.
    #[serde(rename = "XMPToolkit", skip_serializing_if = "Option::is_none")]
    pub toolkit: Option<String>,
    #[serde(flatten)]
    pub properties: NestedMapping,
}

impl XmpData {
    pub fn to_mapping(&self) -> Result<NestedMapping> {
        to_mapping(TagFormat::Xmp, self)
    }
}

/// Decode a raw XMP packet.
pub fn decode_xmp(raw: &[u8]) -> Result<XmpData> {
    let text = String::from_utf8_lossy(raw);
    let xml = extract_packet(&text)
        .ok_or_else(|| Error::decode(TagFormat::Xmp.as_str(), "no xmpmeta or RDF packet"))?;

    let root = Element::parse(xml.as_bytes())
        .map_err(|e| Error::decode(TagFormat::Xmp.as_str(), e.to_string()))?;

    let mut data = XmpData {
        toolkit: root.attributes.get("xmptk").cloned(),
        ..Default::default()
    };
    collect_descriptions(&root, &mut data.properties);

    if data.toolkit.is_none() && data.properties.is_empty() {
        return Err(Error::decode(
            TagFormat::Xmp.as_str(),
            "packet has no properties",
        ));
    }
    Ok(data)
}

fn extract_packet(text: &str) -> Option<&str> {
    slice_between(text, "<x:xmpmeta", "</x:xmpmeta>")
        .or_else(|| slice_between(text, "<rdf:RDF", "</rdf:RDF>"))
}

fn slice_between<'a>(value: &'a str, start_tag: &str, end_tag: &str) -> Option<&'a str> {
    let start = value.find(start_tag)?;
    let end = value[start..].find(end_tag)?;
    Some(&value[start..start + end + end_tag.len()])
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

fn collect_descriptions(element: &Element, properties: &mut NestedMapping) {
    for child in child_elements(element) {
        if child.name == "Description" {
            merge_description(child, properties);
        } else {
            collect_descriptions(child, properties);
        }
    }
}

/// Add one `rdf:Description`'s attribute and element properties.
fn merge_description(description: &Element, properties: &mut NestedMapping) {
    let attributes: BTreeMap<&String, &String> = description.attributes.iter().collect();
    for (name, value) in attributes {
        if name == "about" {
            continue;
        }
        properties
            .entry(name.clone())
            .or_insert_with(|| JsonValue::String(value.trim().to_string()));
    }

    for child in child_elements(description) {
        if let Some(value) = property_value(child) {
            properties.entry(child.name.clone()).or_insert(value);
        }
    }
}

fn property_value(element: &Element) -> Option<JsonValue> {
    for container in child_elements(element) {
        match container.name.as_str() {
            "Alt" => return list_items(container).into_iter().next(),
            "Bag" | "Seq" => {
                let items = list_items(container);
                return (!items.is_empty()).then_some(JsonValue::Array(items));
            }
            "Description" => {
                let mut nested = Map::new();
                merge_description(container, &mut nested);
                return (!nested.is_empty()).then_some(JsonValue::Object(nested));
            }
            _ => {}
        }
    }

    if element.attributes.get("parseType").map(String::as_str) == Some("Resource") {
        let mut nested = Map::new();
        for child in child_elements(element) {
            if let Some(value) = property_value(child) {
                nested.entry(child.name.clone()).or_insert(value);
            }
        }
        return (!nested.is_empty()).then_some(JsonValue::Object(nested));
    }

    if let Some(resource) = element.attributes.get("resource") {
        return Some(JsonValue::String(resource.trim().to_string()));
    }

    let text = element.get_text()?;
    let text = text.trim();
    (!text.is_empty()).then(|| JsonValue::String(text.to_string()))
}

fn list_items(container: &Element) -> Vec<JsonValue> {
    child_elements(container)
        .filter(|item| item.name == "li")
        .filter_map(property_value)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) const SAMPLE_PACKET: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Image::ExifTool 12.40">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmp:CreatorTool="Darktable" xmp:Rating="4">
   <dc:title><rdf:Alt><rdf:li xml:lang="x-default">  Harbor at dawn </rdf:li></rdf:Alt></dc:title>
   <dc:subject><rdf:Bag><rdf:li>harbor</rdf:li><rdf:li>boats</rdf:li></rdf:Bag></dc:subject>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

    #[test]
    fn test_decode_sample_packet() {
        let data = decode_xmp(SAMPLE_PACKET.as_bytes()).unwrap();
        assert_eq!(data.toolkit.as_deref(), Some("Image::ExifTool 12.40"));
        assert_eq!(data.properties["CreatorTool"], "Darktable");
        assert_eq!(data.properties["Rating"], "4");
        assert_eq!(data.properties["title"], "Harbor at dawn");
        assert_eq!(data.properties["subject"], json!(["harbor", "boats"]));
        assert!(!data.properties.contains_key("about"));
    }

    #[test]
    fn test_to_mapping_flattens_properties() {
        let mapping = decode_xmp(SAMPLE_PACKET.as_bytes())
            .unwrap()
            .to_mapping()
            .unwrap();
        assert_eq!(mapping["XMPToolkit"], "Image::ExifTool 12.40");
        assert_eq!(mapping["CreatorTool"], "Darktable");
    }

    #[test]
    fn test_decode_finds_packet_inside_binary() {
        let mut raw = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
        raw.extend_from_slice(SAMPLE_PACKET.as_bytes());
        raw.extend_from_slice(&[0xFF, 0x00, 0x12]);
        assert!(decode_xmp(&raw).is_ok());
    }

    #[test]
    fn test_structured_resource_value() {
        let packet = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
          <rdf:Description xmlns:Iptc4xmpCore="http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/">
            <Iptc4xmpCore:CreatorContactInfo rdf:parseType="Resource">
              <Iptc4xmpCore:CiAdrCity>Lisbon</Iptc4xmpCore:CiAdrCity>
            </Iptc4xmpCore:CreatorContactInfo>
          </rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let data = decode_xmp(packet.as_bytes()).unwrap();
        assert_eq!(
            data.properties["CreatorContactInfo"],
            json!({ "CiAdrCity": "Lisbon" })
        );
    }

    #[test]
    fn test_malformed_xml_fails() {
        let packet = "<x:xmpmeta><rdf:Description></x:xmpmeta>";
        let err = decode_xmp(packet.as_bytes()).unwrap_err();
        assert!(err.to_string().starts_with("XMP decode error"));
    }

    #[test]
    fn test_no_packet_fails() {
        assert!(decode_xmp(b"plain bytes").is_err());
    }
}
