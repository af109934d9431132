//! Line-oriented progress reporting.
//!
//! Core components report human-facing progress through [`ProgressSink`]
//! and never write to the terminal themselves. A pinned line replaces the
//! previous pinned line (status updates); an unpinned line is permanent.

/// Receiver of progress lines.
pub trait ProgressSink: Send + Sync {
    /// Reports one line. `pin` asks the sink to overwrite the previous
    /// pinned line instead of appending.
    fn line(&self, message: &str, pin: bool);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn line(&self, _message: &str, _pin: bool) {}
}

/// Formats `part/whole`.
#[must_use]
pub fn ratio(part: u64, whole: u64) -> String {
    format!("{part}/{whole}")
}

/// Formats `part/whole(percent%)`, rounding the percentage down.
#[must_use]
pub fn ratio_with_percent(part: u64, whole: u64) -> String {
    let percent = if whole == 0 {
        100
    } else {
        part.saturating_mul(100) / whole
    };
    format!("{part}/{whole}({percent}%)")
}
