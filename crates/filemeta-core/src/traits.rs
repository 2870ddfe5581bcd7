//! Trait definitions at the collaborator seams.
//!
//! Extractors read bytes through a [`StreamSource`] and report through
//! [`MetadataExtractor`]; concrete probe and favicon seams live next to
//! their implementations in the extract and embed crates.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::filter::AllowList;
use crate::models::Metadata;
use crate::{Error, Result};

/// A readable byte stream handed to an extractor.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

// =============================================================================
// STREAM SOURCE
// =============================================================================

/// Read-only access to stored file bytes.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open the file `filename` stored at `location` for reading.
    async fn open(&self, location: &str, filename: &str) -> Result<ByteStream>;
}

/// Stream source backed by local directories, one root per location.
#[derive(Debug, Clone, Default)]
pub struct LocalStreamSource {
    roots: HashMap<String, PathBuf>,
}

impl LocalStreamSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the directory that serves `location`.
    pub fn with_location(mut self, location: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(location.into(), root.into());
        self
    }

    fn resolve(&self, location: &str, filename: &str) -> Result<PathBuf> {
        let root = self
            .roots
            .get(location)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown storage location: {}", location)))?;

        let relative = Path::new(filename);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if filename.is_empty() || escapes {
            return Err(Error::InvalidInput(format!(
                "File name must be relative to its location: {}",
                filename
            )));
        }

        Ok(root.join(relative))
    }
}

#[async_trait]
impl StreamSource for LocalStreamSource {
    async fn open(&self, location: &str, filename: &str) -> Result<ByteStream> {
        let path = self.resolve(location, filename)?;
        let file = tokio::fs::File::open(&path).await?;
        Ok(Box::new(file))
    }
}

// =============================================================================
// EXTRACTOR TRAIT
// =============================================================================

/// Derives [`Metadata`] from a byte stream.
///
/// Implementations never fail: decode and probe errors are logged and the
/// result carries whatever subset of fields succeeded.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract metadata, keeping only allow-listed sections in the bag.
    async fn extract(&self, stream: ByteStream, allow_list: &AllowList) -> Metadata;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}
