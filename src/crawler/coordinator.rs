//! Pipeline coordinator - sequencing of one acquisition run
//!
//! A run goes through these phases, each finishing before the next starts:
//! 1. Chapter phase: restore cached chapters, fetch the rest
//! 2. Cover acquisition
//! 3. Image phase: localize images and rewrite chapter bodies
//! 4. Report: snapshot the run stats and write `report.md`
//!
//! Cancellation aborts at the next await point of any phase. Everything saved
//! up to that point stays valid for the next run.

use crate::book::{Book, Chapter};
use crate::config::Config;
use crate::crawler::chapters::fetch_chapters;
use crate::crawler::cover::acquire_cover;
use crate::crawler::images::localize_images;
use crate::crawler::pool::WorkerPool;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::RunContext;
use crate::output::{write_markdown_report, RunReport, RunStats, REPORT_FILE};
use crate::source::ContentSource;
use crate::storage::{ChapterStore, ImageStore};
use crate::HarvestError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of a completed run
#[derive(Debug)]
pub struct RunOutcome {
    /// All chapters sorted by id; failed chapters have an empty body
    pub chapters: Vec<Chapter>,
    pub cover: Option<PathBuf>,
    pub report: RunReport,
}

/// Drives chapters, cover and images of one book through a content source
pub struct Pipeline {
    source: Arc<dyn ContentSource>,
    chapters: ChapterStore,
    images: ImageStore,
    retry: RetryPolicy,
    workers: usize,
    quiet: bool,
    fallback_cover_url: Option<String>,
    config_hash: Option<String>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Creates a pipeline from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `source` - Content source resolved for the book
    /// * `cancel` - Cancelling this token aborts a running [`Pipeline::run`]
    pub fn new(config: &Config, source: Arc<dyn ContentSource>, cancel: CancellationToken) -> Self {
        Self {
            source,
            chapters: ChapterStore::from_config(&config.output),
            images: ImageStore::new(&config.output.output_path),
            retry: RetryPolicy::from_config(&config.crawler),
            workers: config.crawler.workers as usize,
            quiet: config.output.debug_mode,
            fallback_cover_url: config.output.fallback_cover_url.clone(),
            config_hash: None,
            cancel,
        }
    }

    /// Records the configuration hash in the run report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Overrides the retry policy taken from the configuration
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs all phases for `book`
    ///
    /// Per-resource failures do not fail the run; they are listed in the
    /// report. Running again with the same output directory resumes.
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome)` - The run finished
    /// * `Err(HarvestError::Cancelled)` - The run was cancelled
    pub async fn run(&self, book: &Book) -> Result<RunOutcome, HarvestError> {
        tracing::info!(
            "Starting run for '{}': {} chapters in {} volumes, {} workers",
            book.title,
            book.chapters.len(),
            book.volume_count(),
            self.workers
        );

        let stats = Arc::new(RunStats::new());
        let ctx = RunContext {
            source: Arc::clone(&self.source),
            chapters: self.chapters.clone(),
            images: self.images.clone(),
            retry: self.retry,
            stats: Arc::clone(&stats),
            cancel: self.cancel.clone(),
            quiet: self.quiet,
        };
        let pool = WorkerPool::new(self.workers, self.cancel.clone());

        let mut chapters = fetch_chapters(&ctx, &pool, book.chapters.clone()).await?;
        let cover = acquire_cover(&ctx, book, self.fallback_cover_url.as_deref()).await?;
        localize_images(&ctx, &pool, &mut chapters).await?;

        let mut report = stats.report(&book.title, cover.clone());
        if let Some(hash) = &self.config_hash {
            report = report.with_config_hash(hash.as_str());
        }

        let report_path = self.chapters.root().join(REPORT_FILE);
        match write_markdown_report(&report, &report_path) {
            Ok(()) => tracing::info!("Wrote report to {}", report_path.display()),
            Err(e) => tracing::warn!("Could not write {}: {}", report_path.display(), e),
        }

        tracing::info!(
            "Run finished: {} chapters, {} images, {} failures",
            report.chapters_total,
            report.images_total,
            report.failure_count()
        );

        Ok(RunOutcome {
            chapters,
            cover,
            report,
        })
    }
}
