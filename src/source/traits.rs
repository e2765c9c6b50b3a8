//! Content source trait and error kinds

use crate::book::Chapter;
use async_trait::async_trait;
use thiserror::Error;

/// Errors a content source can report
///
/// The distinction drives the retry policy: only `Fetch` is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network-level failure expected to go away on retry
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Parsing or protocol failure that retrying will not fix
    #[error("Adapter error: {0}")]
    Adapter(String),
}

impl SourceError {
    /// Returns true if the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Capability surface of a site adapter
///
/// Both methods are called from many pool tasks at once, so implementations
/// must be safe for concurrent use. The pipeline relies on this but does not
/// enforce it beyond the `Send + Sync` bound.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches the raw HTML body of one chapter
    async fn fetch_chapter_body(&self, chapter: &Chapter) -> SourceResult<String>;

    /// Fetches the raw bytes behind a URL (images, covers)
    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>>;
}
