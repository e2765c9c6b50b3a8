//! Resumable chapter store
//!
//! One JSON record per chapter under `<output>/json`, optionally grouped into
//! `Volume NN` directories.

use crate::book::Chapter;
use crate::config::OutputConfig;
use crate::crawler::parser::{escape_attr, escape_text};
use crate::storage::{write_atomic, ChapterRecord, StorageResult};
use std::path::{Path, PathBuf};

/// Directory under the output root holding chapter records
const RECORD_DIR: &str = "json";

/// Persists chapters and restores them on later runs
#[derive(Debug, Clone)]
pub struct ChapterStore {
    root: PathBuf,
    pack_by_volume: bool,
    add_source_url: bool,
}

impl ChapterStore {
    /// Creates a store rooted at `output_path`
    ///
    /// # Arguments
    ///
    /// * `output_path` - Output root of the run
    /// * `pack_by_volume` - Group records into one directory per volume
    /// * `add_source_url` - Append a source link line when saving
    pub fn new(output_path: impl Into<PathBuf>, pack_by_volume: bool, add_source_url: bool) -> Self {
        Self {
            root: output_path.into(),
            pack_by_volume,
            add_source_url,
        }
    }

    /// Creates a store from the `[output]` configuration section
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(
            &config.output_path,
            config.pack_by_volume,
            config.add_source_url,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the record path of a chapter
    ///
    /// `<root>/json/00042.json`, or `<root>/json/Volume 03/00042.json` when
    /// packing by volume.
    pub fn chapter_path(&self, chapter: &Chapter) -> PathBuf {
        let mut dir = self.root.join(RECORD_DIR);
        if self.pack_by_volume {
            dir = dir.join(format!("Volume {:02}", chapter.volume));
        }
        dir.join(format!("{:05}.json", chapter.id))
    }

    /// Restores a chapter body from its record, if one exists
    ///
    /// The body is copied into `chapter`. An empty string means a cache miss.
    /// A record that cannot be read or parsed is logged and treated as a miss,
    /// so the chapter is fetched again and the record rewritten.
    pub fn load(&self, chapter: &mut Chapter) -> String {
        let path = self.chapter_path(chapter);
        chapter.body.clear();

        if !path.is_file() {
            return String::new();
        }

        let record = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<ChapterRecord>(&content).map_err(|e| e.to_string())
            });

        match record {
            Ok(record) => {
                tracing::debug!("Restoring chapter {} from {}", chapter.id, path.display());
                chapter.body = record.body;
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable record {} for chapter {}: {}",
                    path.display(),
                    chapter.id,
                    e
                );
            }
        }

        chapter.body.clone()
    }

    /// Stamps the chapter body and writes its record
    ///
    /// The stamped body replaces `chapter.body`. Stamping is idempotent, so a
    /// chapter can be saved again after its images are rewritten.
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Path of the written record
    /// * `Err(StorageError)` - The record could not be written
    pub fn save(&self, chapter: &mut Chapter) -> StorageResult<PathBuf> {
        chapter.body = self.stamp_body(chapter);

        let record = ChapterRecord {
            id: chapter.id,
            volume: chapter.volume,
            title: chapter.title.clone(),
            url: chapter.url.clone(),
            body: chapter.body.clone(),
        };
        let json = serde_json::to_vec(&record)?;

        let path = self.chapter_path(chapter);
        write_atomic(&path, &json, true)?;
        tracing::debug!("Saved chapter {} to {}", chapter.id, path.display());

        Ok(path)
    }

    /// Returns the body with the title heading and optional source line added
    ///
    /// Each stamp is only added when the body does not already contain it.
    pub fn stamp_body(&self, chapter: &Chapter) -> String {
        let heading = format!("<h1>{}</h1>", escape_text(&chapter.title));
        let mut body = if chapter.body.contains(&heading) {
            chapter.body.clone()
        } else {
            format!("{}\n{}", heading, chapter.body)
        };

        if self.add_source_url {
            let source_line = format!(
                "<br><p>Source: <a href=\"{}\">{}</a></p>",
                escape_attr(&chapter.url),
                escape_text(&chapter.url)
            );
            if !body.contains(&source_line) {
                body.push_str(&source_line);
            }
        }

        body
    }
}
