//! Terminal progress bars for the chapter and image phases

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Creates the bar for one phase of a run
///
/// # Arguments
///
/// * `label` - Phase name shown before the counter
/// * `len` - Number of chapters or images in the phase
/// * `hidden` - Suppress drawing, used in debug mode where log lines would interleave
pub fn phase_bar(label: &str, len: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("{prefix:>8} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.set_prefix(label.to_string());
    pb
}
