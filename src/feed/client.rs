//! reqwest-backed [`FeedApi`] and [`OverflowSource`].

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, Response};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::error::FeedError;
use super::models::{FeedPage, Pic};
use super::{FeedApi, OverflowSource};
use crate::download::{DispatchOptions, DownloadError, HttpClient};

/// Mobile site root.
pub const DEFAULT_BASE_URL: &str = "https://m.weibo.cn";

/// Retry budget of every feed request.
pub const API_RETRIES: u32 = 1;

/// Prefix of a user's post container id.
const CONTAINER_PREFIX: &str = "107603";

#[allow(clippy::expect_used)]
static PROFILE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/u/(\d{10})$").expect("profile url regex is valid"));

#[allow(clippy::expect_used)]
static RENDER_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var \$render_data = \[(.+)\]\[0\] \|\| \{\};")
        .expect("render data regex is valid")
});

#[derive(Debug, Deserialize)]
struct RenderData {
    status: RenderStatus,
}

#[derive(Debug, Deserialize)]
struct RenderStatus {
    #[serde(default)]
    pics: Vec<Pic>,
}

/// Client for the mobile feed API.
#[derive(Debug, Clone)]
pub struct WeiboClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl WeiboClient {
    /// Creates a client sending `token` (a full `Cookie` value) with every
    /// request.
    #[must_use]
    pub fn new(http: HttpClient, token: Option<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        }
    }

    /// Points the client at another site root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> Result<Response, FeedError> {
        let options = DispatchOptions::new(API_RETRIES, self.token.as_deref());
        self.http
            .dispatch(Method::GET, url, &options)
            .await
            .map_err(|e| FeedError::from_dispatch(url, e))
    }

    async fn get_text(&self, url: &str) -> Result<String, FeedError> {
        let response = self.get(url).await?;
        response.text().await.map_err(|e| FeedError::Transport {
            url: url.to_string(),
            source: DownloadError::network(url, e),
        })
    }
}

#[async_trait]
impl FeedApi for WeiboClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, uid: &str, page: u32, size: u32) -> Result<FeedPage, FeedError> {
        let url = format!(
            "{}/api/container/getIndex?count={size}&page={page}&containerid={CONTAINER_PREFIX}{uid}",
            self.base_url
        );
        let body = self.get_text(&url).await?;
        serde_json::from_str(&body).map_err(|e| FeedError::malformed(&url, e.to_string()))
    }

    #[instrument(level = "debug", skip(self))]
    async fn uid_for_name(&self, name: &str) -> Result<Option<String>, FeedError> {
        let url = format!("{}/n/{}", self.base_url, urlencoding::encode(name));
        let response = self.get(&url).await?;
        let uid = PROFILE_URL
            .captures(response.url().as_str())
            .map(|caps| caps[1].to_string());
        debug!(final_url = %response.url(), ?uid, "resolved display name");
        Ok(uid)
    }

    #[instrument(level = "debug", skip(self))]
    async fn name_for_uid(&self, uid: &str) -> Result<Option<String>, FeedError> {
        let url = format!(
            "{}/api/container/getIndex?type=uid&value={uid}",
            self.base_url
        );
        let body = self.get_text(&url).await?;
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| FeedError::malformed(&url, e.to_string()))?;
        Ok(value
            .pointer("/data/userInfo/screen_name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string))
    }
}

#[async_trait]
impl OverflowSource for WeiboClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_post_pics(&self, permalink: &str) -> Result<Vec<Pic>, FeedError> {
        let body = self.get_text(permalink).await?;
        parse_render_data(&body).map_err(|reason| FeedError::malformed(permalink, reason))
    }
}

/// Extracts `status.pics` from the `$render_data` script of a post page.
///
/// # Errors
///
/// Returns a description of what was missing when the page has no
/// parseable payload.
pub fn parse_render_data(html: &str) -> Result<Vec<Pic>, String> {
    let caps = RENDER_DATA
        .captures(html)
        .ok_or_else(|| "no $render_data payload".to_string())?;
    let data: RenderData = serde_json::from_str(&caps[1]).map_err(|e| e.to_string())?;
    Ok(data.status.pics)
}
