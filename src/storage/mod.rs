//! Storage module for persisting fetched content
//!
//! This module handles all on-disk state of a run:
//! - Chapter records (one JSON file per chapter, optionally grouped by volume)
//! - Content-addressed images
//! - Atomic writes so a record is never observed half-written
//!
//! The presence of a record doubles as the cache: a chapter with a stored,
//! non-empty body is never fetched again.

mod chapter_store;
mod image_store;

pub use chapter_store::ChapterStore;
pub use image_store::{encode_jpeg, encode_png, ImageStore, IMAGE_DIR};

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to persist {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The on-disk form of a chapter
///
/// A missing or empty `body` means the chapter has not been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub id: u32,
    pub volume: u32,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
}

/// Writes a file atomically: temp file in the same directory, then rename
///
/// Parent directories are created as needed. With `overwrite` unset an
/// existing destination is left alone and the call still succeeds, so the
/// first writer wins when two tasks race on the same path.
///
/// # Returns
///
/// * `Ok(true)` - The file was written
/// * `Ok(false)` - The destination already existed and was kept
/// * `Err(StorageError)` - Directory creation or the write failed
pub fn write_atomic(path: &Path, contents: &[u8], overwrite: bool) -> StorageResult<bool> {
    let parent = path.parent().ok_or_else(|| StorageError::Persist {
        path: path.to_path_buf(),
        message: "path has no parent directory".to_string(),
    })?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.flush()?;

    if overwrite {
        temp.persist(path).map_err(|e| StorageError::Persist {
            path: path.to_path_buf(),
            message: e.error.to_string(),
        })?;
        return Ok(true);
    }

    match temp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if path.exists() => {
            tracing::debug!("{} already written by another task: {}", path.display(), e.error);
            Ok(false)
        }
        Err(e) => Err(StorageError::Persist {
            path: path.to_path_buf(),
            message: e.error.to_string(),
        }),
    }
}
