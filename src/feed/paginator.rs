//! The feed page loop.
//!
//! Pages are fetched one at a time, newest first. Each post is classified
//! against the [`BoundaryRange`]: posts inside the window go to the
//! [`ResourceExtractor`], posts newer than the window are skipped, and the
//! first post at or below the floor ends pagination once its page is done.
//! Pagination also ends on an empty page, on the anti-scraping status, after
//! too many failed pages in a row, or on cancellation. A failed page is
//! requested again rather than skipped, so none of its posts are lost.
//!
//! Every iteration is followed by the configured pause, whatever its outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use super::extractor::ResourceExtractor;
use super::models::{FeedPage, Post};
use super::FeedApi;
use crate::boundary::{BoundaryRange, Verdict};
use crate::context::RunContext;
use crate::progress::{ProgressSink, ratio};
use crate::resource::Resource;

/// Cards requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Pagination settings.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    pub page_size: u32,
    /// Pause after every page request.
    pub interval: Duration,
    /// Consecutive empty pages that end pagination.
    pub empty_page_limit: u32,
    /// Consecutive failed pages that end pagination.
    pub max_inconclusive_pages: u32,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            interval: Duration::from_secs(1),
            empty_page_limit: 1,
            max_inconclusive_pages: 3,
        }
    }
}

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The feed ran out of posts.
    Exhausted,
    /// A post at or below the lower boundary was reached.
    ReachedFloor,
    /// The API answered with its throttling status.
    AntiScraping,
    /// Too many pages in a row failed.
    TooManyFailures,
    Cancelled,
}

/// Everything collected for one account.
#[derive(Debug, Clone)]
pub struct FeedHarvest {
    pub resources: Vec<Resource>,
    /// Screen name taken from the account's own posts.
    pub screen_name: Option<String>,
    /// `bid` of the first post seen, the watermark for the next run.
    pub newest_bid: Option<String>,
    /// Non-pinned posts examined.
    pub scanned: u64,
    /// Post count the API declared on the first page that had one.
    pub declared_total: u64,
    /// Page requests made.
    pub pages: u32,
    pub termination: Termination,
}

#[derive(Debug, Default)]
struct FeedCursor {
    page: u32,
    seen: u64,
    declared_total: u64,
    empty_streak: u32,
    inconclusive: u32,
    exceeded: bool,
}

#[derive(Debug, Default)]
struct Findings {
    resources: Vec<Resource>,
    screen_name: Option<String>,
    newest_bid: Option<String>,
}

/// Walks one account's feed.
#[derive(Clone)]
pub struct FeedPaginator {
    api: Arc<dyn FeedApi>,
    extractor: ResourceExtractor,
    range: BoundaryRange,
    config: PaginatorConfig,
}

impl std::fmt::Debug for FeedPaginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPaginator")
            .field("extractor", &self.extractor)
            .field("range", &self.range)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeedPaginator {
    #[must_use]
    pub fn new(
        api: Arc<dyn FeedApi>,
        extractor: ResourceExtractor,
        range: BoundaryRange,
        config: PaginatorConfig,
    ) -> Self {
        Self {
            api,
            extractor,
            range,
            config,
        }
    }

    /// Collects the resources of `uid` inside the boundary.
    #[instrument(skip(self, progress, ctx), fields(range = %self.range))]
    pub async fn collect(&self, uid: &str, progress: &dyn ProgressSink, ctx: &RunContext) -> FeedHarvest {
        let mut cursor = FeedCursor {
            page: 1,
            ..FeedCursor::default()
        };
        let mut findings = Findings::default();
        let mut pages = 0;

        let termination = loop {
            if ctx.is_cancelled() {
                break Termination::Cancelled;
            }

            pages += 1;
            let page_number = cursor.page;
            let verdict = match self.api.fetch_page(uid, page_number, self.config.page_size).await {
                Ok(page) => {
                    cursor.inconclusive = 0;
                    self.evaluate_page(uid, &page, &mut cursor, &mut findings, progress)
                        .await;
                    let verdict = if cursor.exceeded {
                        Some(Termination::ReachedFloor)
                    } else if cursor.empty_streak >= self.config.empty_page_limit {
                        Some(Termination::Exhausted)
                    } else {
                        None
                    };
                    progress.line(
                        &format!(
                            "{} {}(#{page_number})",
                            if verdict.is_none() { "Analysing weibos..." } else { "Finish analysis" },
                            ratio(cursor.seen, cursor.declared_total),
                        ),
                        true,
                    );
                    cursor.page += 1;
                    verdict
                }
                Err(error) if error.is_anti_scraping() => {
                    progress.line(
                        &format!("punished by anti-scraping mechanism (#{page_number})"),
                        true,
                    );
                    warn!(uid, page = page_number, "anti-scraping response, stopping pagination");
                    Some(Termination::AntiScraping)
                }
                Err(error) => {
                    cursor.inconclusive += 1;
                    warn!(
                        uid,
                        page = page_number,
                        failures = cursor.inconclusive,
                        error = %error,
                        "feed page failed"
                    );
                    (cursor.inconclusive >= self.config.max_inconclusive_pages)
                        .then_some(Termination::TooManyFailures)
                }
            };

            let interrupted = tokio::select! {
                () = ctx.cancel_token().cancelled() => true,
                () = tokio::time::sleep(self.config.interval) => false,
            };
            if let Some(termination) = verdict {
                break termination;
            }
            if interrupted {
                break Termination::Cancelled;
            }
        };

        progress.line(
            &format!(
                "Practically scanned {} weibos, get {} {}",
                cursor.seen,
                findings.resources.len(),
                if self.extractor.include_video() { "resources" } else { "pictures" }
            ),
            false,
        );
        info!(
            uid,
            scanned = cursor.seen,
            resources = findings.resources.len(),
            pages,
            ?termination,
            "pagination finished"
        );

        FeedHarvest {
            resources: findings.resources,
            screen_name: findings.screen_name,
            newest_bid: findings.newest_bid,
            scanned: cursor.seen,
            declared_total: cursor.declared_total,
            pages,
            termination,
        }
    }

    async fn evaluate_page(
        &self,
        uid: &str,
        page: &FeedPage,
        cursor: &mut FeedCursor,
        findings: &mut Findings,
        progress: &dyn ProgressSink,
    ) {
        if cursor.declared_total == 0
            && let Some(total) = page.declared_total()
        {
            cursor.declared_total = total;
        }

        let now = Local::now().naive_local();
        let mut usable = 0_u32;
        for card in page.cards() {
            let post = match Post::from_card(card, now) {
                Ok(Some(post)) => post,
                Ok(None) => continue,
                Err(error) => {
                    warn!(page = cursor.page, error = %error, "skipping malformed post");
                    continue;
                }
            };
            if post.mblog.is_pinned() {
                continue;
            }
            usable += 1;
            cursor.seen += 1;

            if findings.screen_name.is_none()
                && post.is_by(uid)
                && let Some(name) = post.mblog.user.as_ref().and_then(|u| u.screen_name.clone())
            {
                findings.screen_name = Some(name);
            }
            if findings.newest_bid.is_none() {
                findings.newest_bid = Some(post.mblog.bid.clone());
            }

            match self.range.classify(&post.key()) {
                Verdict::Include => {
                    let resources = self.extractor.extract(uid, &post, progress).await;
                    findings.resources.extend(resources);
                }
                Verdict::AboveCeiling => {}
                Verdict::AtOrBelowFloor => {
                    if !cursor.exceeded {
                        debug!(mid = post.mblog.mid, "reached lower boundary");
                    }
                    cursor.exceeded = true;
                }
            }
        }

        if page.is_ok() && usable > 0 {
            cursor.empty_streak = 0;
        } else {
            cursor.empty_streak += 1;
        }
    }
}
