//! Favicon resolution.
//!
//! Candidates come from a chain of strategies, each run only when the
//! consumer asks for more:
//!
//! 1. `<link>` tags: `icon`, `shortcut icon`, `apple-touch-icon`, `mask-icon`
//! 2. the well-known `/favicon.ico`, kept only if a GET succeeds
//! 3. `icons` from the web app manifest
//!
//! The consumer takes the first candidate with a URL and drops the stream,
//! so later strategies never issue a request.

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value as JsonValue;
use tracing::{debug, trace, warn};
use url::Url;

use filemeta_core::defaults::FAVICON_WELL_KNOWN_PATH;
use filemeta_core::{Error, FaviconCandidate, Result};

use crate::client::EmbedClient;
use crate::html::{has_rel, link_tags};

const ICON_RELS: &[&str] = &["icon", "apple-touch-icon", "mask-icon"];

/// One way of finding favicon candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaviconStrategy {
    LinkTags,
    WellKnown,
    Manifest,
}

impl FaviconStrategy {
    /// Strategies in the order they are tried.
    pub const ORDER: [FaviconStrategy; 3] = [
        FaviconStrategy::LinkTags,
        FaviconStrategy::WellKnown,
        FaviconStrategy::Manifest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaviconStrategy::LinkTags => "link_tags",
            FaviconStrategy::WellKnown => "well_known",
            FaviconStrategy::Manifest => "manifest",
        }
    }

    async fn run(
        self,
        client: &EmbedClient,
        page_url: &Url,
        html: &str,
    ) -> Result<Vec<FaviconCandidate>> {
        match self {
            FaviconStrategy::LinkTags => Ok(link_tag_candidates(html)),
            FaviconStrategy::WellKnown => {
                let url = page_url
                    .join(FAVICON_WELL_KNOWN_PATH)
                    .map_err(|e| Error::InvalidInput(format!("Bad favicon URL: {}", e)))?;
                if client.exists(&url).await? {
                    Ok(vec![FaviconCandidate::new(url)])
                } else {
                    Ok(vec![FaviconCandidate::empty()])
                }
            }
            FaviconStrategy::Manifest => manifest_candidates(client, page_url, html).await,
        }
    }
}

fn link_tag_candidates(html: &str) -> Vec<FaviconCandidate> {
    link_tags(html)
        .iter()
        .filter(|link| ICON_RELS.iter().any(|rel| has_rel(link, rel)))
        .map(|link| match link.get("href") {
            Some(href) => FaviconCandidate::new(href.clone()),
            None => FaviconCandidate::empty(),
        })
        .collect()
}

async fn manifest_candidates(
    client: &EmbedClient,
    page_url: &Url,
    html: &str,
) -> Result<Vec<FaviconCandidate>> {
    let Some(href) = link_tags(html)
        .into_iter()
        .find(|link| has_rel(link, "manifest"))
        .and_then(|mut link| link.remove("href"))
    else {
        return Ok(Vec::new());
    };
    let manifest_url = page_url
        .join(&href)
        .map_err(|e| Error::InvalidInput(format!("Bad manifest URL: {}", e)))?;

    let manifest = client.fetch_json(&manifest_url).await?;
    let icons = manifest
        .get("icons")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    // Manifest icon paths are relative to the manifest, not the page.
    Ok(icons
        .iter()
        .map(|icon| {
            icon.get("src")
                .and_then(JsonValue::as_str)
                .and_then(|src| manifest_url.join(src).ok())
                .map(FaviconCandidate::new)
                .unwrap_or_else(FaviconCandidate::empty)
        })
        .collect())
}

/// Lazily produce candidates from every strategy, in order.
///
/// A strategy runs only once the previous strategy's candidates are
/// consumed. A failing strategy is logged and yields no candidates.
pub fn candidates<'a>(
    client: &'a EmbedClient,
    page_url: &'a Url,
    html: &'a str,
) -> impl Stream<Item = FaviconCandidate> + 'a {
    stream::iter(FaviconStrategy::ORDER)
        .then(move |strategy| async move {
            trace!(strategy = strategy.as_str(), "Running favicon strategy");
            match strategy.run(client, page_url, html).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(
                        subsystem = "embed",
                        component = "favicon",
                        strategy = strategy.as_str(),
                        error = %e,
                        "Favicon strategy failed"
                    );
                    Vec::new()
                }
            }
        })
        .flat_map(stream::iter)
}

/// Pull candidates until one has a usable URL, then stop.
///
/// The winning URL is resolved against `base`. Returning drops the
/// stream, which cancels any strategy that has not run yet.
pub async fn first_favicon<S>(candidates: S, base: &Url) -> Option<String>
where
    S: Stream<Item = FaviconCandidate>,
{
    futures::pin_mut!(candidates);
    while let Some(candidate) = candidates.next().await {
        let Some(href) = candidate.usable_url() else {
            trace!("Skipping favicon candidate without URL");
            continue;
        };
        match base.join(href) {
            Ok(url) => return Some(url.to_string()),
            Err(e) => warn!(
                subsystem = "embed",
                component = "favicon",
                href = %href,
                error = %e,
                "Unresolvable favicon candidate"
            ),
        }
    }
    None
}

/// Resolves a page's favicon through the strategy chain.
#[derive(Debug, Clone)]
pub struct FaviconResolver {
    client: EmbedClient,
}

impl FaviconResolver {
    pub fn new(client: EmbedClient) -> Self {
        Self { client }
    }

    /// Absolute favicon URL for the page, if any strategy finds one.
    pub async fn resolve(&self, page_url: &Url, html: &str) -> Option<String> {
        let found = first_favicon(candidates(&self.client, page_url, html), page_url).await;
        debug!(
            subsystem = "embed",
            component = "favicon",
            url = %page_url,
            found = found.is_some(),
            "Favicon resolution complete"
        );
        found
    }
}
