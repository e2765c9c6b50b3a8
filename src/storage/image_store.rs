//! Content-addressed image files
//!
//! Images live under `<output>/images/<key>.jpg` where the key is derived from
//! the resolved source URL. A file that exists is complete, since it only
//! appears through an atomic rename.

use crate::storage::{write_atomic, StorageResult};
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Directory under the output root holding images
pub const IMAGE_DIR: &str = "images";

/// Extension given to every stored image
const IMAGE_EXT: &str = "jpg";

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Creates a store writing into `<output_path>/images`
    pub fn new(output_path: impl AsRef<Path>) -> Self {
        Self {
            dir: output_path.as_ref().join(IMAGE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a content-address key
    pub fn file_name(key: &str) -> String {
        format!("{}.{}", key, IMAGE_EXT)
    }

    /// Absolute path of the image stored under `key`
    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    /// Path of the image relative to the output root, as referenced from chapter bodies
    pub fn relative_path(key: &str) -> String {
        format!("{}/{}", IMAGE_DIR, Self::file_name(key))
    }

    /// Returns true when the image for `key` is already on disk
    pub fn contains(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    /// Stores encoded JPEG bytes under `key`
    ///
    /// When another task already stored the same key its file is kept.
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Path of the stored image
    /// * `Err(StorageError)` - The image directory or file could not be written
    pub fn store(&self, key: &str, jpeg: &[u8]) -> StorageResult<PathBuf> {
        let path = self.path(key);
        if write_atomic(&path, jpeg, false)? {
            tracing::debug!("Stored image {}", path.display());
        }
        Ok(path)
    }
}

/// Decodes any supported image format and re-encodes it as an RGB JPEG
///
/// This is CPU-bound; async callers should run it on the blocking pool.
pub fn encode_jpeg(bytes: &[u8]) -> StorageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

/// Decodes any supported image format and re-encodes it as PNG
pub fn encode_png(bytes: &[u8]) -> StorageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;

    let mut out = Cursor::new(Vec::new());
    decoded.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
