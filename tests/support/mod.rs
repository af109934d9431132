//! Helpers shared by the integration test crates.

#![allow(dead_code)]

pub mod socket_guard;

use std::sync::Mutex;

use weibo_downloader_core::ProgressSink;

/// Progress sink keeping every line for assertions.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    lines: Mutex<Vec<(String, bool)>>,
}

impl RecordingProgress {
    pub fn unpinned(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| {
                lines
                    .iter()
                    .filter(|(_, pin)| !pin)
                    .map(|(line, _)| line.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.lines
            .lock()
            .map(|lines| lines.iter().any(|(line, _)| line.contains(fragment)))
            .unwrap_or(false)
    }
}

impl ProgressSink for RecordingProgress {
    fn line(&self, message: &str, pin: bool) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((message.to_string(), pin));
        }
    }
}
