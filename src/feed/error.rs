//! Error types for feed requests.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors from the feed API and post pages.
///
/// None of these is fatal to a run: pagination counts a failed page as
/// inconclusive and asks for the same page again, and a post that cannot be expanded simply
/// contributes nothing.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The request itself failed (network, timeout, non-success status).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: DownloadError,
    },

    /// The API answered with its throttling status.
    #[error("punished by anti-scraping mechanism at {url}")]
    AntiScraping { url: String },

    /// The response did not have the expected shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FeedError {
    /// Wraps a dispatch error, recognizing the throttling status.
    pub(crate) fn from_dispatch(url: impl Into<String>, source: DownloadError) -> Self {
        let url = url.into();
        if source.status() == Some(crate::download::ANTI_SCRAPING_STATUS) {
            Self::AntiScraping { url }
        } else {
            Self::Transport { url, source }
        }
    }

    pub(crate) fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the anti-scraping signal.
    #[must_use]
    pub fn is_anti_scraping(&self) -> bool {
        matches!(self, Self::AntiScraping { .. })
    }
}
