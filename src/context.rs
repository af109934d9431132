//! Per-run shared state.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// State shared by pagination and every download worker of one run.
///
/// Holds the interrupt signal and the aggregate byte counter used for
/// throughput reporting. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    downloaded_bytes: AtomicU64,
}

impl RunContext {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context driven by an existing token.
    #[must_use]
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            downloaded_bytes: AtomicU64::new(0),
        }
    }

    /// The run-wide cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Requests a whole-run abort.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether an abort was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Adds completed bytes and returns the new total.
    pub fn record_bytes(&self, bytes: u64) -> u64 {
        self.downloaded_bytes.fetch_add(bytes, Ordering::SeqCst) + bytes
    }

    /// Total bytes downloaded so far.
    #[must_use]
    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::SeqCst)
    }
}
