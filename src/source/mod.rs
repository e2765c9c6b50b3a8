//! Content sources: the site adapters the pipeline fetches through
//!
//! This module contains:
//! - The [`ContentSource`] capability trait and its error kinds
//! - The [`SourceRegistry`] that maps base URLs to sources
//! - [`HttpSource`], a selector-driven adapter for plain HTML sites

mod http;
mod registry;
mod traits;

pub use http::{build_http_client, HttpSource};
pub use registry::SourceRegistry;
pub use traits::{ContentSource, SourceError, SourceResult};
