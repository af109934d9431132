//! Helpers shared by unit tests.

#[path = "../../tests/support/socket_guard.rs"]
pub(crate) mod socket_guard;

use std::sync::Mutex;

use crate::progress::ProgressSink;

/// Progress sink that keeps every line for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingProgress {
    lines: Mutex<Vec<(String, bool)>>,
}

impl RecordingProgress {
    pub(crate) fn lines(&self) -> Vec<(String, bool)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub(crate) fn unpinned(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(_, pin)| !pin)
            .map(|(line, _)| line)
            .collect()
    }

    pub(crate) fn contains(&self, fragment: &str) -> bool {
        self.lines().iter().any(|(line, _)| line.contains(fragment))
    }
}

impl ProgressSink for RecordingProgress {
    fn line(&self, message: &str, pin: bool) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((message.to_string(), pin));
        }
    }
}
