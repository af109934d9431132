//! Feed walking: from an account to its list of media resources.
//!
//! # Architecture
//!
//! - [`FeedApi`] - async seam over the mobile feed API (pages and account
//!   lookups)
//! - [`OverflowSource`] - async seam over post pages, used when a post has
//!   more pictures than the feed shows inline
//! - [`WeiboClient`] - the reqwest-backed implementation of both
//! - [`ResourceExtractor`] - post to resources
//! - [`FeedPaginator`] - the page loop with boundary filtering and the
//!   termination rules
//!
//! Both seams use `async_trait` so the paginator can hold them as
//! `Arc<dyn ...>` and tests can substitute in-memory fakes.

mod account;
mod client;
mod date;
mod error;
mod extractor;
mod models;
mod paginator;

pub use account::{Account, is_account_id, resolve_account};
pub use client::{API_RETRIES, DEFAULT_BASE_URL, WeiboClient, parse_render_data};
pub use date::parse_created_at;
pub use error::FeedError;
pub use extractor::{INLINE_PHOTO_LIMIT, ResourceExtractor};
pub use models::{Card, FeedPage, MediaInfo, Mblog, Pic, PicVariant, Post, User};
pub use paginator::{
    DEFAULT_PAGE_SIZE, FeedHarvest, FeedPaginator, PaginatorConfig, Termination,
};

use async_trait::async_trait;

/// Access to the feed API.
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Fetches page `page` (1-based) of `uid`'s feed with `size` cards.
    async fn fetch_page(&self, uid: &str, page: u32, size: u32) -> Result<FeedPage, FeedError>;

    /// Account identifier for a display name, `None` when unknown.
    async fn uid_for_name(&self, name: &str) -> Result<Option<String>, FeedError>;

    /// Display name for an account identifier, `None` when unknown.
    async fn name_for_uid(&self, uid: &str) -> Result<Option<String>, FeedError>;
}

/// Full picture list of a single post.
#[async_trait]
pub trait OverflowSource: Send + Sync {
    /// Fetches the pictures of the post at `permalink`.
    async fn fetch_post_pics(&self, permalink: &str) -> Result<Vec<Pic>, FeedError>;
}
