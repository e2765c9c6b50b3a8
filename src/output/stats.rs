//! Per-run progress counters and failure tally
//!
//! [`RunStats`] is owned by one pipeline invocation and shared with its tasks
//! through an `Arc`. It only observes the run and never steers it.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Kind of resource a failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Chapter,
    Image,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chapter => "chapter",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}

/// A resource that could not be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ResourceKind,
    /// Chapter id, for chapter failures
    pub chapter_id: Option<u32>,
    pub url: String,
    pub reason: String,
}

/// Concurrent tally of a single run
#[derive(Debug)]
pub struct RunStats {
    started_at: DateTime<Utc>,
    chapters_total: AtomicUsize,
    chapters_done: AtomicUsize,
    chapters_fetched: AtomicUsize,
    images_total: AtomicUsize,
    images_done: AtomicUsize,
    images_fetched: AtomicUsize,
    failures: Mutex<Vec<Failure>>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            chapters_total: AtomicUsize::new(0),
            chapters_done: AtomicUsize::new(0),
            chapters_fetched: AtomicUsize::new(0),
            images_total: AtomicUsize::new(0),
            images_done: AtomicUsize::new(0),
            images_fetched: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn set_chapter_total(&self, total: usize) {
        self.chapters_total.store(total, Ordering::Relaxed);
    }

    pub fn set_image_total(&self, total: usize) {
        self.images_total.store(total, Ordering::Relaxed);
    }

    /// Counts one finished chapter; `fetched` is set when it came from the network
    pub fn chapter_done(&self, fetched: bool) {
        self.chapters_done.fetch_add(1, Ordering::Relaxed);
        if fetched {
            self.chapters_fetched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Counts one finished image; `fetched` is set when bytes were downloaded
    pub fn image_done(&self, fetched: bool) {
        self.images_done.fetch_add(1, Ordering::Relaxed);
        if fetched {
            self.images_fetched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn chapters_done(&self) -> usize {
        self.chapters_done.load(Ordering::Relaxed)
    }

    pub fn chapters_fetched(&self) -> usize {
        self.chapters_fetched.load(Ordering::Relaxed)
    }

    pub fn images_done(&self) -> usize {
        self.images_done.load(Ordering::Relaxed)
    }

    pub fn images_fetched(&self) -> usize {
        self.images_fetched.load(Ordering::Relaxed)
    }

    /// Records a failed resource and logs it with its URL
    pub fn record_failure(
        &self,
        kind: ResourceKind,
        chapter_id: Option<u32>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) {
        let failure = Failure {
            kind,
            chapter_id,
            url: url.into(),
            reason: reason.into(),
        };
        tracing::warn!("Failed {} {}: {}", failure.kind, failure.url, failure.reason);
        self.lock_failures().push(failure);
    }

    pub fn failure_count(&self) -> usize {
        self.lock_failures().len()
    }

    /// Failures of one kind, chapters ordered by id
    pub fn failures_of(&self, kind: ResourceKind) -> Vec<Failure> {
        let mut failures: Vec<Failure> = self
            .lock_failures()
            .iter()
            .filter(|f| f.kind == kind)
            .cloned()
            .collect();
        failures.sort_by(|a, b| a.chapter_id.cmp(&b.chapter_id).then_with(|| a.url.cmp(&b.url)));
        failures
    }

    /// Takes a snapshot for reporting
    pub fn report(&self, book_title: &str, cover: Option<PathBuf>) -> RunReport {
        let mut failures = self.lock_failures().clone();
        failures.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.chapter_id.cmp(&b.chapter_id))
                .then_with(|| a.url.cmp(&b.url))
        });

        RunReport {
            book_title: book_title.to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            chapters_total: self.chapters_total.load(Ordering::Relaxed),
            chapters_done: self.chapters_done(),
            chapters_fetched: self.chapters_fetched(),
            images_total: self.images_total.load(Ordering::Relaxed),
            images_done: self.images_done(),
            images_fetched: self.images_fetched(),
            cover,
            config_hash: None,
            failures,
        }
    }

    fn lock_failures(&self) -> MutexGuard<'_, Vec<Failure>> {
        // A poisoned list is still a valid list of failures
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Snapshot of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub book_title: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub chapters_total: usize,
    pub chapters_done: usize,
    pub chapters_fetched: usize,
    pub images_total: usize,
    pub images_done: usize,
    pub images_fetched: usize,
    pub cover: Option<PathBuf>,
    pub config_hash: Option<String>,
    pub failures: Vec<Failure>,
}

impl RunReport {
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Ids of the chapters that have no body after the run
    pub fn failed_chapter_ids(&self) -> Vec<u32> {
        self.failures
            .iter()
            .filter(|f| f.kind == ResourceKind::Chapter)
            .filter_map(|f| f.chapter_id)
            .collect()
    }

    pub fn chapters_cached(&self) -> usize {
        self.chapters_done.saturating_sub(self.chapters_fetched)
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Percentage of chapters that ended the run with a body
    pub fn chapter_success_rate(&self) -> f64 {
        if self.chapters_total == 0 {
            return 100.0;
        }
        let failed = self.failed_chapter_ids().len();
        (self.chapters_total.saturating_sub(failed) as f64 / self.chapters_total as f64) * 100.0
    }
}

/// Prints a short summary of the run to stdout
pub fn print_report(report: &RunReport) {
    println!("=== {} ===\n", report.book_title);
    println!(
        "Chapters: {} of {} ({} fetched, {} cached)",
        report.chapters_total.saturating_sub(report.failed_chapter_ids().len()),
        report.chapters_total,
        report.chapters_fetched,
        report.chapters_cached()
    );
    println!(
        "Images: {} ({} fetched)",
        report.images_total, report.images_fetched
    );
    match &report.cover {
        Some(cover) => println!("Cover: {}", cover.display()),
        None => println!("Cover: none"),
    }
    println!("Failures: {}", report.failure_count());

    for failure in &report.failures {
        println!("  - [{}] {}: {}", failure.kind, failure.url, failure.reason);
    }
}
