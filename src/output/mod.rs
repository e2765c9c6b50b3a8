//! Output module for run progress and reports
//!
//! This module handles:
//! - Counting finished chapters and images while a run is in flight
//! - Collecting per-resource failures from concurrent tasks
//! - Progress bars for each phase
//! - Printing and writing the final run report

mod markdown;
mod progress;
pub mod stats;

pub use markdown::{format_markdown_report, write_markdown_report, REPORT_FILE};
pub use progress::phase_bar;
pub use stats::{print_report, Failure, ResourceKind, RunReport, RunStats};
