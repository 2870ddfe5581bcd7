//! # filemeta-core
//!
//! Core types, traits, and configuration for the filemeta extraction
//! pipeline.
//!
//! This crate provides the data model returned to callers, the shared
//! error type, process-wide configuration, and the allow-list filter that
//! the extract and embed crates depend on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{env_secs, ConfigError, MetadataConfig};
pub use error::{Error, Result};
pub use filter::{trim_strings, AllowList};
pub use models::*;
pub use traits::*;
