//! HTTP client wrapper used for feed requests and media downloads.
//!
//! [`HttpClient::dispatch`] is the single request entry point: it sends one
//! request with an optional session token, retries transient failures within
//! a per-call budget, and returns the response with its final (post-redirect)
//! URL, headers and a lazily streamed body.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::COOKIE;
use reqwest::{Client, ClientBuilder, Method, Proxy, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    API_CONNECT_TIMEOUT_SECS, API_READ_TIMEOUT_SECS, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS,
};
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::user_agent;

/// Per-call dispatch settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions<'a> {
    /// Immediate retries allowed for transient failures.
    pub retries: u32,
    /// Opaque session token sent verbatim as the `Cookie` header.
    pub token: Option<&'a str>,
}

impl<'a> DispatchOptions<'a> {
    /// Options with a retry budget and an optional token.
    #[must_use]
    pub fn new(retries: u32, token: Option<&'a str>) -> Self {
        Self { retries, token }
    }
}

/// HTTP client with connection pooling, gzip and the mobile User-Agent.
///
/// Create once and clone freely; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a media download client (30s connect, 5min read).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a feed API client (10s connect, 30s read).
    ///
    /// # Panics
    ///
    /// See [`HttpClient::new`].
    #[must_use]
    pub fn for_api() -> Self {
        Self::new_with_timeouts(API_CONNECT_TIMEOUT_SECS, API_READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values and environment proxies.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = base_client_builder(connect_timeout_secs, read_timeout_secs)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Creates a media download client with an explicit proxy.
    ///
    /// `None` keeps the environment proxies, an empty string disables every
    /// proxy, anything else is used as the proxy URL for all schemes
    /// (`http`, `https` and `socks5`).
    ///
    /// # Errors
    ///
    /// Returns the reqwest error when the proxy URL is invalid or the client
    /// cannot be built.
    #[instrument(level = "debug")]
    pub fn with_proxy(proxy: Option<&str>) -> Result<Self, reqwest::Error> {
        let mut builder = base_client_builder(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS);
        match proxy.map(str::trim) {
            None => {}
            Some("") => {
                debug!("proxies disabled");
                builder = builder.no_proxy();
            }
            Some(proxy) => {
                builder = builder.proxy(Proxy::all(proxy)?);
            }
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Sends a request and returns the successful response.
    ///
    /// Transient failures are retried up to `options.retries` times with
    /// exponential backoff. Non-success statuses become
    /// [`DownloadError::HttpStatus`]; the anti-scraping status is never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns the last [`DownloadError`] once the budget is spent or the
    /// failure is not retryable.
    #[instrument(level = "debug", skip(self, options), fields(url = %url, retries = options.retries))]
    pub async fn dispatch(
        &self,
        method: Method,
        url: &str,
        options: &DispatchOptions<'_>,
    ) -> Result<Response, DownloadError> {
        let policy = RetryPolicy::from_budget(options.retries);
        let mut attempt = 1;
        loop {
            let error = match self.send_request(method.clone(), url, options.token).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            match policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    debug!(error = %error, attempt, delay_ms = delay.as_millis(), "retrying request");
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(error = %error, reason, "giving up on request");
                    return Err(error);
                }
            }
        }
    }

    async fn send_request(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let mut request = self.client.request(method, parsed);
        if let Some(token) = token {
            request = request.header(COOKIE, token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }
}

/// Streams a response body to `file`, returning bytes written.
pub(crate) async fn stream_to_file(
    file: &mut File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}
