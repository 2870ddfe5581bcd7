//! Embed metadata resolution.
//!
//! oEmbed discovery and the page scrape run concurrently and are merged by
//! source priority. Neither source can fail the resolution; a failing
//! source contributes nothing.

use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use url::Url;

use filemeta_core::EmbedMetadata;

use crate::client::EmbedClient;
use crate::favicon::FaviconResolver;
use crate::html::decode_entities;
use crate::oembed::{fetch_oembed, OEmbed};
use crate::scrape::{scrape_page, MediaCandidate, PageScrape};

/// Resolves a URL into [`EmbedMetadata`].
#[derive(Debug, Clone)]
pub struct EmbedResolver {
    client: EmbedClient,
    favicons: FaviconResolver,
}

impl EmbedResolver {
    pub fn new(client: EmbedClient) -> Self {
        Self {
            favicons: FaviconResolver::new(client.clone()),
            client,
        }
    }

    /// Create with the request timeout from the environment.
    pub fn from_env() -> filemeta_core::Result<Self> {
        Ok(Self::new(EmbedClient::from_env()?))
    }

    /// Resolve embed metadata for `url`.
    ///
    /// Always returns a record. A URL that does not parse, or whose oEmbed
    /// descriptor has no `type`, yields the seed `{embed_url}`.
    pub async fn resolve(&self, url: &str) -> EmbedMetadata {
        let page_url = match Url::parse(url) {
            Ok(page_url) => page_url,
            Err(e) => {
                warn!(
                    subsystem = "embed",
                    url = %url,
                    error = %e,
                    "Invalid embed URL"
                );
                return EmbedMetadata::seed(url);
            }
        };

        // Each branch fetches the page itself so neither waits on the other.
        let (oembed, scrape) = tokio::join!(
            fetch_oembed(&self.client, &page_url),
            scrape_page(&self.client, &self.favicons, &page_url),
        );

        let oembed = oembed.unwrap_or_else(|e| {
            warn!(
                subsystem = "embed",
                component = "oembed",
                url = %url,
                error = %e,
                "oEmbed lookup failed"
            );
            None
        });
        let scrape = scrape.unwrap_or_else(|e| {
            warn!(
                subsystem = "embed",
                component = "scrape",
                url = %url,
                error = %e,
                "Page scrape failed"
            );
            PageScrape::default()
        });

        let embed = merge(url, oembed, scrape);
        info!(
            subsystem = "embed",
            url = %url,
            embed_type = embed.embed_type.as_deref().unwrap_or("none"),
            has_title = embed.title.is_some(),
            "Embed resolution complete"
        );
        embed
    }

    /// [`resolve`](Self::resolve) bounded by `timeout`.
    ///
    /// On expiry the in-flight requests are dropped and the seed is
    /// returned.
    pub async fn resolve_with_timeout(&self, url: &str, timeout: Duration) -> EmbedMetadata {
        match tokio::time::timeout(timeout, self.resolve(url)).await {
            Ok(embed) => embed,
            Err(_) => {
                warn!(
                    subsystem = "embed",
                    url = %url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Embed resolution timed out"
                );
                EmbedMetadata::seed(url)
            }
        }
    }
}

/// Merge both sources into one record.
///
/// Without an oEmbed `type` the URL is not an embed and the seed is
/// returned, whatever the scrape found.
pub fn merge(url: &str, oembed: Option<OEmbed>, scrape: PageScrape) -> EmbedMetadata {
    let oembed = oembed.unwrap_or_default();
    let Some(kind) = oembed.kind().map(str::to_string) else {
        debug!(
            subsystem = "embed",
            url = %url,
            scraped = !scrape.is_empty(),
            "No oEmbed type, not an embed"
        );
        return EmbedMetadata::seed(url);
    };

    let title = first_text([
        oembed.title(),
        scrape.og_title.as_deref(),
        scrape.twitter_title.as_deref(),
        scrape.dc_title.as_deref(),
    ]);
    let description = first_text([
        oembed.description(),
        scrape.og_description.as_deref(),
        scrape.twitter_description.as_deref(),
        scrape.dc_description.as_deref(),
    ]);

    let dimensions = [&scrape.og_video, &scrape.twitter_player, &scrape.og_image]
        .into_iter()
        .find(|list| !list.is_empty())
        .and_then(|list| list.first())
        .and_then(MediaCandidate::dimensions);

    let duration = scrape
        .og_video_duration
        .as_deref()
        .or(scrape.music_duration.as_deref())
        .and_then(|raw| duration_ms(url, raw));

    let mut metadata = match scrape.to_mapping() {
        Ok(mapping) => mapping,
        Err(e) => {
            warn!(subsystem = "embed", url = %url, error = %e, "Dropping page scrape fields");
            Default::default()
        }
    };
    metadata.insert(
        "oembed".to_string(),
        JsonValue::Object(oembed.into_fields()),
    );

    EmbedMetadata {
        embed_type: Some(format!("embed/{}", kind)),
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        duration,
        title,
        description,
        metadata: Some(metadata),
        ..EmbedMetadata::seed(url)
    }
}

fn first_text<'a>(sources: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    sources
        .into_iter()
        .flatten()
        .map(|text| decode_entities(text.trim()))
        .find(|text| !text.is_empty())
}

/// Integer seconds to milliseconds. Unparseable values are logged and
/// dropped.
fn duration_ms(url: &str, raw: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs.saturating_mul(1000)),
        Err(e) => {
            warn!(
                subsystem = "embed",
                url = %url,
                duration = %raw,
                error = %e,
                "Unparseable embed duration"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://video.example/watch/1";

    fn oembed(fields: JsonValue) -> Option<OEmbed> {
        match fields {
            JsonValue::Object(map) => Some(OEmbed::new(map)),
            _ => unreachable!(),
        }
    }

    fn candidate(width: Option<u32>, height: Option<u32>) -> MediaCandidate {
        MediaCandidate {
            url: Some("https://cdn.example/x".to_string()),
            width,
            height,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_type_returns_seed() {
        let scrape = PageScrape {
            og_title: Some("Foo".to_string()),
            ..Default::default()
        };
        let embed = merge(URL, None, scrape.clone());
        assert_eq!(embed, EmbedMetadata::seed(URL));

        let embed = merge(URL, oembed(json!({"title": "Bar"})), scrape);
        assert_eq!(embed, EmbedMetadata::seed(URL));
    }

    #[test]
    fn test_title_and_description_precedence() {
        let scrape = PageScrape {
            og_title: Some("OG".to_string()),
            twitter_title: Some("Tw".to_string()),
            twitter_description: Some("Fish &amp; chips".to_string()),
            dc_description: Some("DC".to_string()),
            ..Default::default()
        };
        let embed = merge(URL, oembed(json!({"type": "video", "title": "  "})), scrape);
        assert_eq!(embed.embed_type.as_deref(), Some("embed/video"));
        assert_eq!(embed.title.as_deref(), Some("OG"));
        assert_eq!(embed.description.as_deref(), Some("Fish & chips"));

        let embed = merge(
            URL,
            oembed(json!({"type": "rich", "title": "Own"})),
            PageScrape {
                og_title: Some("OG".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(embed.title.as_deref(), Some("Own"));
        assert_eq!(embed.description, None);
    }

    #[test]
    fn test_dimensions_from_og_image() {
        let scrape = PageScrape {
            og_image: vec![candidate(Some(1200), Some(630))],
            ..Default::default()
        };
        let embed = merge(URL, oembed(json!({"type": "photo"})), scrape);
        assert_eq!((embed.width, embed.height), (Some(1200), Some(630)));
    }

    #[test]
    fn test_dimensions_prefer_video_and_discard_partial_pairs() {
        let scrape = PageScrape {
            og_video: vec![candidate(Some(640), None)],
            twitter_player: vec![candidate(Some(480), Some(270))],
            og_image: vec![candidate(Some(1200), Some(630))],
            ..Default::default()
        };
        let embed = merge(URL, oembed(json!({"type": "video"})), scrape);
        assert_eq!((embed.width, embed.height), (None, None));

        let scrape = PageScrape {
            twitter_player: vec![candidate(Some(480), Some(270))],
            og_image: vec![candidate(Some(1200), Some(630))],
            ..Default::default()
        };
        let embed = merge(URL, oembed(json!({"type": "video"})), scrape);
        assert_eq!((embed.width, embed.height), (Some(480), Some(270)));
    }

    #[test]
    fn test_duration_seconds_to_ms() {
        let scrape = PageScrape {
            music_duration: Some("215".to_string()),
            ..Default::default()
        };
        let embed = merge(URL, oembed(json!({"type": "rich"})), scrape);
        assert_eq!(embed.duration, Some(215_000));
    }

    #[test]
    fn test_bad_duration_is_omitted() {
        let scrape = PageScrape {
            og_video_duration: Some("PT3M".to_string()),
            ..Default::default()
        };
        let embed = merge(URL, oembed(json!({"type": "video"})), scrape);
        assert_eq!(embed.duration, None);
        assert_eq!(embed.embed_type.as_deref(), Some("embed/video"));
    }

    #[test]
    fn test_metadata_nests_oembed_beside_scrape_fields() {
        let scrape = PageScrape {
            og_site_name: Some("Site".to_string()),
            favicon: Some("https://video.example/favicon.ico".to_string()),
            ..Default::default()
        };
        let embed = merge(
            URL,
            oembed(json!({"type": "video", "provider_name": "Vid"})),
            scrape,
        );
        let metadata = embed.metadata.unwrap();
        assert_eq!(metadata["oembed"]["provider_name"], "Vid");
        assert_eq!(metadata["ogSiteName"], "Site");
        assert_eq!(metadata["favicon"], "https://video.example/favicon.ico");
    }

    #[tokio::test]
    async fn test_invalid_url_returns_seed() {
        let resolver = EmbedResolver::new(EmbedClient::new(Duration::from_secs(1)).unwrap());
        assert_eq!(
            resolver.resolve("not a url").await,
            EmbedMetadata::seed("not a url")
        );
    }
}
