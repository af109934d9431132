//! Weibo Downloader Core Library
//!
//! Incremental mirroring of a user's public Weibo feed: walk the paginated
//! mobile feed API, pick out photos (and optionally videos) inside a
//! caller-supplied id/date window, and download them concurrently with
//! retry rounds and quarantine of broken files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`boundary`] - Inclusion window over post ids and dates
//! - [`feed`] - Feed API access, post extraction and pagination
//! - [`download`] - HTTP dispatch, file naming and the download scheduler
//! - [`resource`] - The media record and the dumped resource list
//! - [`progress`] - Line-oriented progress reporting interface
//! - [`context`] - Per-run cancellation and byte counters

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boundary;
pub mod context;
pub mod download;
pub mod feed;
pub mod progress;
pub mod resource;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use boundary::{BoundaryError, BoundaryRange, BoundaryValue, PostKey, Verdict, bid_to_mid};
pub use context::RunContext;
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRY, DownloadError, DownloadReport, DownloadScheduler,
    HttpClient, NameTemplate,
};
pub use feed::{FeedApi, FeedError, FeedPaginator, OverflowSource, ResourceExtractor, WeiboClient};
pub use progress::{NullProgress, ProgressSink};
pub use resource::{MediaKind, Resource};
