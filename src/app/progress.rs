//! Terminal rendering of progress lines.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use weibo_downloader_core::ProgressSink;

/// [`ProgressSink`] for the console.
///
/// With a live line, pinned messages replace its text and unpinned ones are
/// printed above it. Without one, pinned messages only reach debug logs and
/// unpinned ones become `info` events.
pub(crate) struct ConsoleProgress {
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub(crate) fn new(use_progress_line: bool) -> Self {
        let bar = use_progress_line.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        });
        Self { bar }
    }

    /// Leaves the last pinned message on screen.
    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn line(&self, message: &str, pin: bool) {
        match (&self.bar, pin) {
            (Some(bar), true) => bar.set_message(message.to_string()),
            (Some(bar), false) => bar.suspend(|| println!("{message}")),
            (None, true) => debug!(status = message, "progress"),
            (None, false) => info!("{message}"),
        }
    }
}
