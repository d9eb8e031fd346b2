//! Progress indicators for the azdo CLI.

use azdokit::Operation;
use azdokit::poller::PollCallback;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// A ticking spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// A spinner attached to a multi-progress display
pub fn multi_spinner(multi: &MultiProgress, msg: &str) -> ProgressBar {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(spinner_style());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows operation status on a spinner while the poller waits.
pub struct SpinnerCallback {
    pb: ProgressBar,
    label: String,
}

impl SpinnerCallback {
    pub fn new(pb: ProgressBar, label: impl Into<String>) -> Self {
        Self {
            pb,
            label: label.into(),
        }
    }

    pub fn progress_bar(&self) -> &ProgressBar {
        &self.pb
    }
}

impl PollCallback for SpinnerCallback {
    fn on_pending(&self, poll: u32, operation: &Operation, elapsed: Duration) {
        log::debug!(
            "{}: operation {} {} (poll {})",
            self.label,
            operation.id,
            operation.status,
            poll
        );
        self.pb.set_message(format!(
            "{}: {} ({})",
            self.label,
            operation.status,
            ui::format_secs(elapsed.as_secs())
        ));
    }
}
