//! Progress reporting for loads
//!
//! Renders [`LoadProgress`] updates with `indicatif`.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::loader::LoadProgress;

/// Spinner showing running row counts during a load
pub struct LoadProgressBar {
    bar: ProgressBar,
}

impl LoadProgressBar {
    /// Create a spinner for a load into `target`
    pub fn new(target: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(target.to_string());
        bar.set_message("Rows: 0");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Hidden reporter (for non-interactive output)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update from loader counts
    pub fn update(&self, progress: &LoadProgress) {
        if progress.attempted % 100 == 0 || progress.attempted < 100 {
            self.bar.set_message(format!(
                "Rows: {} ({} ok, {} failed)",
                format_number(progress.attempted as u64),
                format_number(progress.succeeded as u64),
                format_number(progress.failed as u64)
            ));
        }
    }

    /// Finish with success message
    pub fn finish_success(&self, msg: &str) {
        self.bar.finish_with_message(format!("✓ {}", msg));
    }

    /// Finish with error message
    pub fn finish_error(&self, msg: &str) {
        self.bar.abandon_with_message(format!("✗ {}", msg));
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
