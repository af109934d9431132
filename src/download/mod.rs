//! Media download layer.
//!
//! - [`HttpClient`]: the single request entry point, shared by the feed
//!   client and media downloads
//! - [`DownloadScheduler`]: bounded-concurrency downloads with retry rounds
//!   and cancellation
//! - [`NameTemplate`]: file names from `{key:spec}` templates
//! - [`sanitize_file_name`] and quarantine helpers for broken files

mod client;
pub mod constants;
mod engine;
mod error;
mod filename;
mod name_template;
mod retry;

pub use client::{DispatchOptions, HttpClient};
pub use engine::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRY, DownloadReport, DownloadScheduler, FailedResource,
    SchedulerError,
};
pub use error::DownloadError;
pub use filename::{file_name_from_url, quarantine, quarantine_path, sanitize_file_name};
pub use name_template::{DEFAULT_TEMPLATE, NameTemplate, normalize_text};
pub use retry::{
    ANTI_SCRAPING_STATUS, FailureType, RetryDecision, RetryPolicy, classify_error,
};
