//! Error types for the download module.
//!
//! This module defines structured errors for request dispatch and media
//! downloads, providing context-rich messages for progress lines and logs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while dispatching a request or downloading a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The request ended at a different address than requested.
    #[error("{url} got redirected to {final_url}")]
    Redirected {
        /// Requested address.
        url: String,
        /// Address the response came from.
        final_url: String,
    },

    /// Downloaded file size does not match the declared content length.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// The media was replaced by the "no longer exists" placeholder.
    #[error("{url} is no longer available (placeholder {final_url})")]
    Placeholder {
        /// Requested address.
        url: String,
        /// Placeholder address the request ended at.
        final_url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unexpected-redirect error.
    pub fn redirected(url: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self::Redirected {
            url: url.into(),
            final_url: final_url.into(),
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a placeholder error.
    pub fn placeholder(url: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self::Placeholder {
            url: url.into(),
            final_url: final_url.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the file on disk cannot be trusted as a complete download.
    #[must_use]
    pub fn is_integrity_mismatch(&self) -> bool {
        matches!(self, Self::Redirected { .. } | Self::Integrity { .. })
    }

    /// Whether another download round could change the outcome.
    ///
    /// Placeholders are final: the media is gone upstream.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Placeholder { .. } | Self::InvalidUrl { .. })
    }
}

// Constructors stand in for `From<reqwest::Error>` / `From<std::io::Error>`:
// every variant needs the url or path the source error does not carry.
