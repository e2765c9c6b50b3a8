//! Novel-Harvest: a resumable chapter acquisition engine
//!
//! This crate fetches the chapters of a serialized novel through a pluggable
//! content source, caches every chapter on disk so interrupted runs resume
//! cheaply, localizes embedded images and acquires a cover image. The result is
//! a normalized, ordered chapter collection ready for e-book packaging.

pub mod book;
pub mod config;
pub mod crawler;
pub mod output;
pub mod source;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Novel-Harvest operations
///
/// Per-resource failures (a chapter or an image that could not be fetched)
/// never surface here; they are tallied in [`output::RunStats`]. Only
/// cancellation and unrecoverable setup problems abort a run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Book manifest error: {0}")]
    Book(#[from] book::BookError),

    #[error("Run cancelled by user")]
    Cancelled,

    #[error("No registered source handles {url}")]
    UnknownSource { url: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Novel-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use book::{load_book, Book, Chapter, Volume};
pub use config::Config;
pub use crawler::{Pipeline, RetryPolicy, RunOutcome, WorkerPool};
pub use output::{RunReport, RunStats};
pub use source::{ContentSource, HttpSource, SourceError, SourceRegistry};
pub use storage::{ChapterStore, ImageStore};
