//! Constants for the download module (timeouts, polling, sentinels).

use std::time::Duration;

/// Media download connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Media download read timeout (5 minutes for large videos).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Feed API connect timeout.
pub const API_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Feed API read timeout.
pub const API_READ_TIMEOUT_SECS: u64 = 30;

/// How often the scheduler reports progress and checks for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Final-URL fragment of the "media no longer exists" placeholder image
/// (`default_d_h_large.gif` and friends).
pub const PLACEHOLDER_MARKER: &str = "_large.gif";
