//! Acquisition engine for chapters, images and covers
//!
//! This module contains the core fetch-and-cache logic, including:
//! - Bounded task scheduling on a worker pool
//! - Retry with linear backoff for transient failures
//! - The chapter phase, image phase and cover acquisition
//! - HTML fragment parsing and rewriting
//! - Overall run coordination

mod chapters;
mod coordinator;
mod cover;
mod images;
pub mod parser;
mod pool;
mod retry;

pub use chapters::fetch_chapters;
pub use coordinator::{Pipeline, RunOutcome};
pub use cover::{acquire_cover, COVER_FILE};
pub use images::{decode_data_uri, localize_images};
pub use pool::{TaskError, TaskHandle, WorkerPool};
pub use retry::{RetryError, RetryPolicy};

use crate::output::RunStats;
use crate::source::ContentSource;
use crate::storage::{ChapterStore, ImageStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a pipeline task needs, cheap to clone into each task
#[derive(Clone)]
pub struct RunContext {
    pub source: Arc<dyn ContentSource>,
    pub chapters: ChapterStore,
    pub images: ImageStore,
    pub retry: RetryPolicy,
    pub stats: Arc<RunStats>,
    pub cancel: CancellationToken,
    /// Hide progress bars
    pub quiet: bool,
}
