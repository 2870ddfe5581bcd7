//! Page scrape: Open Graph, Twitter Card, and Dublin Core tags.
//!
//! Repeated structured properties (`og:image`, `og:video`,
//! `twitter:image`, `twitter:player`) become candidate lists. A new
//! candidate starts at each root property; its `:width`, `:height`,
//! `:type`, and URL variants attach to the most recent candidate.

use serde::Serialize;
use serde_json::Value as JsonValue;
use url::Url;

use filemeta_core::{Error, NestedMapping, Result};

use crate::client::EmbedClient;
use crate::favicon::FaviconResolver;
use crate::html::{has_rel, link_tags, meta_tags};

/// One image, video, or player candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCandidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_url: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl MediaCandidate {
    /// Width and height, only when both are present.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }

    fn is_empty(&self) -> bool {
        self == &MediaCandidate::default()
    }
}

/// Fields scraped from a page's head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageScrape {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_locale: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub og_image: Vec<MediaCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub og_video: Vec<MediaCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_video_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub twitter_image: Vec<MediaCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub twitter_player: Vec<MediaCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl PageScrape {
    pub fn is_empty(&self) -> bool {
        self == &PageScrape::default()
    }

    pub fn to_mapping(&self) -> Result<NestedMapping> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map),
            _ => Err(Error::Internal(
                "page scrape serialized to non-object".to_string(),
            )),
        }
    }
}

/// Which candidate list a structured property belongs to.
#[derive(Clone, Copy)]
enum CandidateList {
    OgImage,
    OgVideo,
    TwitterImage,
    TwitterPlayer,
}

impl PageScrape {
    fn list(&mut self, which: CandidateList) -> &mut Vec<MediaCandidate> {
        match which {
            CandidateList::OgImage => &mut self.og_image,
            CandidateList::OgVideo => &mut self.og_video,
            CandidateList::TwitterImage => &mut self.twitter_image,
            CandidateList::TwitterPlayer => &mut self.twitter_player,
        }
    }

    /// Start a new candidate for a root property, or fill in the URL of a
    /// candidate opened by an earlier sub-property.
    fn push_root(&mut self, which: CandidateList, url: String) {
        let list = self.list(which);
        if let Some(last) = list.last_mut().filter(|last| last.url.is_none()) {
            last.url = Some(url);
            return;
        }
        list.push(MediaCandidate {
            url: Some(url),
            ..Default::default()
        });
    }

    fn current(&mut self, which: CandidateList) -> &mut MediaCandidate {
        let list = self.list(which);
        if list.is_empty() {
            list.push(MediaCandidate::default());
        }
        let last = list.len() - 1;
        &mut list[last]
    }

    fn apply_sub(&mut self, which: CandidateList, sub: &str, value: String) {
        let candidate = self.current(which);
        match sub {
            "url" | "src" => set_once(&mut candidate.url, value),
            "secure_url" => set_once(&mut candidate.secure_url, value),
            "type" => set_once(&mut candidate.mime_type, value),
            "width" => candidate.width = candidate.width.or(parse_dimension(&value)),
            "height" => candidate.height = candidate.height.or(parse_dimension(&value)),
            "alt" => set_once(&mut candidate.alt, value),
            _ => {}
        }
    }

    fn drop_empty_candidates(&mut self) {
        for list in [
            &mut self.og_image,
            &mut self.og_video,
            &mut self.twitter_image,
            &mut self.twitter_player,
        ] {
            list.retain(|c| !c.is_empty());
        }
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

/// Extract scrape fields from page HTML. Relative favicon links are
/// resolved against `base`.
pub fn parse_page(html: &str, base: &Url) -> PageScrape {
    let mut page = PageScrape::default();

    for (key, value) in meta_tags(html) {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }

        let (root, sub) = match key.as_str() {
            "og:image" | "og:image:url" => (Some(CandidateList::OgImage), None),
            "og:video" | "og:video:url" => (Some(CandidateList::OgVideo), None),
            "twitter:image" | "twitter:image:src" => (Some(CandidateList::TwitterImage), None),
            "twitter:player" => (Some(CandidateList::TwitterPlayer), None),
            _ => {
                let sub = [
                    ("og:image:", CandidateList::OgImage),
                    ("og:video:", CandidateList::OgVideo),
                    ("twitter:image:", CandidateList::TwitterImage),
                    ("twitter:player:", CandidateList::TwitterPlayer),
                ]
                .into_iter()
                .find_map(|(prefix, list)| key.strip_prefix(prefix).map(|s| (list, s)));
                (None, sub)
            }
        };

        if let Some(list) = root {
            page.push_root(list, value);
            continue;
        }
        if let Some((list, sub)) = sub {
            if key == "og:video:duration" {
                set_once(&mut page.og_video_duration, value);
            } else {
                page.apply_sub(list, sub, value);
            }
            continue;
        }

        let slot = match key.as_str() {
            "og:title" => &mut page.og_title,
            "og:description" => &mut page.og_description,
            "og:type" => &mut page.og_type,
            "og:url" => &mut page.og_url,
            "og:site_name" => &mut page.og_site_name,
            "og:locale" => &mut page.og_locale,
            "twitter:card" => &mut page.twitter_card,
            "twitter:site" => &mut page.twitter_site,
            "twitter:creator" => &mut page.twitter_creator,
            "twitter:title" => &mut page.twitter_title,
            "twitter:description" => &mut page.twitter_description,
            "dc.title" | "dcterms.title" => &mut page.dc_title,
            "dc.description" | "dcterms.description" => &mut page.dc_description,
            "dc.creator" | "dcterms.creator" => &mut page.dc_creator,
            "dc.publisher" | "dcterms.publisher" => &mut page.dc_publisher,
            "dc.date" | "dcterms.date" => &mut page.dc_date,
            "dc.language" | "dcterms.language" => &mut page.dc_language,
            "music:duration" => &mut page.music_duration,
            _ => continue,
        };
        set_once(slot, value);
    }

    page.drop_empty_candidates();
    page.favicon = link_tags(html)
        .iter()
        .filter(|link| has_rel(link, "icon"))
        .filter_map(|link| link.get("href"))
        .filter(|href| !href.trim().is_empty())
        .find_map(|href| base.join(href.trim()).ok())
        .map(String::from);

    page
}

/// Fetch and scrape a page, falling back to the favicon resolver when the
/// page declares no icon link.
pub async fn scrape_page(
    client: &EmbedClient,
    favicons: &FaviconResolver,
    page_url: &Url,
) -> Result<PageScrape> {
    let page = client.fetch_text(page_url).await?;
    let mut scrape = parse_page(&page.body, &page.url);

    if scrape.favicon.is_none() {
        scrape.favicon = favicons.resolve(&page.url, &page.body).await;
    }
    Ok(scrape)
}
