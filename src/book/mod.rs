//! Book model: the chapter descriptors handed to the acquisition pipeline
//!
//! A [`Book`] is produced outside the core (by a site adapter or a hand-written
//! manifest) and lists every chapter to fetch in enumeration order. The
//! pipeline fills in chapter bodies but never adds or removes chapters.

mod manifest;

pub use manifest::{load_book, parse_book};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a book manifest
#[derive(Debug, Error)]
pub enum BookError {
    #[error("Failed to read book manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse book manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid book manifest: {0}")]
    Validation(String),
}

/// A single chapter of a novel
///
/// `id` is 1-based and follows enumeration order. `body` stays empty until the
/// chapter is fetched or restored from the on-disk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u32,
    #[serde(default = "default_volume")]
    pub volume: u32,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
}

impl Chapter {
    /// Creates a chapter descriptor with an empty body
    pub fn new(id: u32, volume: u32, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            volume,
            title: title.into(),
            url: url.into(),
            body: String::new(),
        }
    }

    /// Returns true once the body has been fetched or restored
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

fn default_volume() -> u32 {
    1
}

/// A volume is only a grouping label for chapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: u32,
    #[serde(default)]
    pub title: Option<String>,
}

/// The enumerated descriptor set of one novel
#[derive(Debug, Clone, Deserialize)]
pub struct Book {
    pub title: String,

    #[serde(default)]
    pub author: Option<String>,

    /// Novel landing page, used to pick the content source
    #[serde(rename = "novel-url")]
    pub novel_url: String,

    #[serde(rename = "cover-url", default)]
    pub cover_url: Option<String>,

    #[serde(rename = "volume", default)]
    pub volumes: Vec<Volume>,

    #[serde(rename = "chapter", default)]
    pub chapters: Vec<Chapter>,
}

impl Book {
    /// Number of distinct volumes referenced by the chapters
    pub fn volume_count(&self) -> usize {
        let mut ids: Vec<u32> = self.chapters.iter().map(|c| c.volume).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}
