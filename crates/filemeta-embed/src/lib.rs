//! # filemeta-embed
//!
//! Embed metadata resolution for filemeta.
//!
//! This crate provides:
//! - oEmbed discovery and JSON/XML descriptor parsing
//! - Open Graph, Twitter Card, and Dublin Core page scraping
//! - Priority merge of both sources into `EmbedMetadata`
//! - Favicon resolution over a lazy, cancellable candidate stream
//!
//! # Example
//!
//! ```rust,no_run
//! use filemeta_embed::EmbedResolver;
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = EmbedResolver::from_env().unwrap();
//!     let embed = resolver.resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await;
//!     println!("{:?} {:?}", embed.embed_type, embed.title);
//! }
//! ```

pub mod client;
pub mod favicon;
pub mod html;
pub mod oembed;
pub mod resolver;
pub mod scrape;

pub use client::{EmbedClient, FetchedPage};
pub use favicon::{candidates, first_favicon, FaviconResolver, FaviconStrategy};
pub use oembed::{discover, fetch_oembed, OEmbed, OEmbedFormat, OEmbedLink};
pub use resolver::{merge, EmbedResolver};
pub use scrape::{parse_page, scrape_page, MediaCandidate, PageScrape};

pub use filemeta_core::{EmbedMetadata, FaviconCandidate};
