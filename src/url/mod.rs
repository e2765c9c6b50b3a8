//! URL handling module for Novel-Harvest
//!
//! This module provides base URL normalization for the source registry,
//! resolution of embedded resource references, and content-address keys.

mod normalize;
mod resolve;

use thiserror::Error;

// Re-export main functions
pub use normalize::normalize_base_url;
pub use resolve::{content_key, is_data_uri, resolve_resource_url};

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;
