//! Download scheduler: bounded-concurrency fetching of a resource list
//! with whole-batch retry rounds.
//!
//! Every resource gets its own Tokio task inside a [`JoinSet`]. Tasks wait
//! for a semaphore permit before touching the network, so at most
//! `concurrency` transfers run at once. Resources that fail with a
//! retryable error are collected and run again in the next round, up to
//! `max_retry` extra rounds.
//!
//! # Cancellation
//!
//! When the run's token is cancelled, tasks still waiting for a permit
//! return immediately; transfers already running are allowed to finish.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use weibo_downloader_core::context::RunContext;
//! use weibo_downloader_core::download::{DownloadScheduler, HttpClient, NameTemplate};
//! use weibo_downloader_core::progress::NullProgress;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = DownloadScheduler::new(HttpClient::new(), 20, 10)?;
//! let ctx = Arc::new(RunContext::new());
//! let report = scheduler
//!     .run(Vec::new(), Path::new("./1234567890"), &NameTemplate::default(), &ctx, &NullProgress)
//!     .await;
//! println!("{} succeeded, {} failed", report.succeeded, report.failed.len());
//! # Ok(())
//! # }
//! ```

mod task;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use self::task::{DownloadTask, TaskOutcome, Transfer, run_task};
use super::constants::POLL_INTERVAL;
use super::name_template::NameTemplate;
use super::HttpClient;
use crate::context::RunContext;
use crate::progress::{ProgressSink, ratio_with_percent};
use crate::resource::Resource;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of parallel transfers.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default number of retry rounds after the first one.
pub const DEFAULT_MAX_RETRY: u32 = 10;

const NOT_STARTED: &str = "cancelled before the download started";

/// Error type for scheduler construction.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// A resource that did not download, with its last error.
#[derive(Debug, Clone)]
pub struct FailedResource {
    pub resource: Resource,
    /// Rendered file name.
    pub name: String,
    pub error: String,
}

/// Outcome of [`DownloadScheduler::run`].
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Resources handed to the scheduler.
    pub total: usize,
    /// Downloaded or already present.
    pub succeeded: usize,
    /// Final failures: non-retryable ones, plus whatever still failed after
    /// the last round or was never started because of cancellation.
    pub failed: Vec<FailedResource>,
    /// Rounds actually run.
    pub rounds: u32,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct RoundOutcome {
    succeeded: usize,
    retry: Vec<FailedResource>,
    permanent: Vec<FailedResource>,
    cancelled: bool,
}

/// Concurrent downloader with retry rounds.
#[derive(Debug)]
pub struct DownloadScheduler {
    client: HttpClient,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    max_retry: u32,
    overwrite: bool,
    poll_interval: Duration,
}

impl DownloadScheduler {
    /// Creates a scheduler running at most `concurrency` transfers at once
    /// and at most `max_retry` retry rounds.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if `concurrency` is
    /// outside 1..=100.
    #[instrument(level = "debug", skip(client))]
    pub fn new(
        client: HttpClient,
        concurrency: usize,
        max_retry: u32,
    ) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, max_retry, "creating download scheduler");
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            max_retry,
            overwrite: false,
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Re-download files that already exist instead of skipping them.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Interval between "Downloading..." status lines.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    /// Downloads `resources` into `album`, naming files with `template`.
    ///
    /// Individual download failures never fail the run; they are returned
    /// in [`DownloadReport::failed`].
    #[instrument(skip_all, fields(album = %album.display(), total = resources.len()))]
    pub async fn run(
        &self,
        resources: Vec<Resource>,
        album: &Path,
        template: &NameTemplate,
        ctx: &Arc<RunContext>,
        progress: &dyn ProgressSink,
    ) -> DownloadReport {
        let mut report = DownloadReport {
            total: resources.len(),
            ..DownloadReport::default()
        };
        let mut pending = resources;
        let mut carried: Vec<FailedResource> = Vec::new();
        let mut round: u32 = 0;

        while !pending.is_empty() && round <= self.max_retry {
            if ctx.is_cancelled() {
                report.cancelled = true;
                if round == 0 {
                    carried = not_started(pending, template);
                }
                break;
            }
            if round > 0 {
                progress.line(&format!("Automatic retry {round}"), false);
            }

            let outcome = self
                .run_round(&pending, round, album, template, ctx, progress)
                .await;
            report.rounds = round + 1;
            report.succeeded += outcome.succeeded;
            let failures = outcome.retry.len() + outcome.permanent.len();
            report.failed.extend(outcome.permanent);

            if outcome.cancelled {
                report.cancelled = true;
                carried = outcome.retry;
                break;
            }

            progress.line(
                &format!(
                    "Success {}, failure {}, total {}",
                    pending.len() - failures,
                    failures,
                    pending.len()
                ),
                false,
            );
            pending = outcome.retry.iter().map(|f| f.resource.clone()).collect();
            carried = outcome.retry;
            round += 1;
        }

        report.failed.extend(carried);
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            rounds = report.rounds,
            cancelled = report.cancelled,
            "download run finished"
        );
        report
    }

    async fn run_round(
        &self,
        pending: &[Resource],
        round: u32,
        album: &Path,
        template: &NameTemplate,
        ctx: &Arc<RunContext>,
        progress: &dyn ProgressSink,
    ) -> RoundOutcome {
        let mut tasks = JoinSet::new();
        let mut names = Vec::with_capacity(pending.len());

        for (slot, resource) in pending.iter().enumerate() {
            let name = template.render(resource);
            let task = DownloadTask {
                resource: resource.clone(),
                destination: album.join(&name),
                attempt: round + 1,
            };
            names.push(name);
            let worker = run_task(
                self.client.clone(),
                task,
                self.overwrite,
                Arc::clone(ctx),
                Arc::clone(&self.semaphore),
            );
            tasks.spawn(async move { (slot, worker.await) });
        }

        let total = pending.len() as u64;
        let mut done: u64 = 0;
        let mut outcomes: Vec<Option<TaskOutcome>> = pending.iter().map(|_| None).collect();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = ctx.cancel_token().clone();
        let mut cancelling = cancel.is_cancelled();

        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    done += 1;
                    match joined {
                        Ok((slot, outcome)) => {
                            report_outcome(&outcome, progress);
                            outcomes[slot] = Some(outcome);
                        }
                        Err(join_error) => {
                            warn!(error = %join_error, "download task panicked");
                        }
                    }
                }
                _ = ticker.tick() => {
                    if cancelling {
                        progress.line(
                            &format!("waiting for cancellation... ({})", total - done),
                            true,
                        );
                    } else {
                        progress.line(
                            &format!("Downloading... {}", ratio_with_percent(done, total)),
                            true,
                        );
                    }
                }
                () = cancel.cancelled(), if !cancelling => {
                    cancelling = true;
                    info!(running = total - done, "cancellation requested, letting started downloads finish");
                }
            }
        }

        if cancelling {
            progress.line("waiting for cancellation... (0)", true);
        } else {
            progress.line(
                &format!("All tasks done {}", ratio_with_percent(done, total)),
                true,
            );
        }

        let mut round_outcome = RoundOutcome {
            cancelled: cancelling || ctx.is_cancelled(),
            ..RoundOutcome::default()
        };
        for ((resource, name), outcome) in pending.iter().zip(names).zip(outcomes) {
            let failed = |error: String| FailedResource {
                resource: resource.clone(),
                name,
                error,
            };
            match outcome {
                Some(TaskOutcome::Downloaded(_) | TaskOutcome::AlreadyPresent) => {
                    round_outcome.succeeded += 1;
                }
                Some(TaskOutcome::Failed(error)) if !error.is_retryable() => {
                    round_outcome.permanent.push(failed(error.to_string()));
                }
                Some(TaskOutcome::Failed(error)) => {
                    round_outcome.retry.push(failed(error.to_string()));
                }
                Some(TaskOutcome::Cancelled) => {
                    round_outcome.retry.push(failed(NOT_STARTED.to_string()));
                }
                None => {
                    round_outcome.retry.push(failed("download task panicked".to_string()));
                }
            }
        }
        debug!(
            round,
            succeeded = round_outcome.succeeded,
            retry = round_outcome.retry.len(),
            permanent = round_outcome.permanent.len(),
            "round finished"
        );
        round_outcome
    }
}

fn not_started(resources: Vec<Resource>, template: &NameTemplate) -> Vec<FailedResource> {
    resources
        .into_iter()
        .map(|resource| FailedResource {
            name: template.render(&resource),
            resource,
            error: NOT_STARTED.to_string(),
        })
        .collect()
}

fn report_outcome(outcome: &TaskOutcome, progress: &dyn ProgressSink) {
    match outcome {
        TaskOutcome::Downloaded(transfer) => progress.line(&completion_line(transfer), false),
        TaskOutcome::Failed(error) => progress.line(&error.to_string(), false),
        TaskOutcome::AlreadyPresent | TaskOutcome::Cancelled => {}
    }
}

#[allow(clippy::cast_precision_loss)]
fn completion_line(transfer: &Transfer) -> String {
    let kilobytes = transfer.bytes as f64 / 1000.0;
    let seconds = transfer.elapsed.as_secs_f64();
    let speed = kilobytes / seconds.max(0.001);
    let total_megabytes = transfer.run_total_bytes as f64 / 1_000_000.0;
    format!(
        "[{}] {} [{:.2} KB] finished in {:.1} seconds, {:.2} K/s, total {:.2} MB downloaded.",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        transfer.final_url,
        kilobytes,
        seconds,
        speed,
        total_megabytes
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource::MediaKind;
    use crate::test_support::RecordingProgress;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn photo(base: &str, file: &str, index: u32) -> Resource {
        Resource {
            uid: "1234567890".to_string(),
            mid: 4_693_825_922_396_919,
            bid: "KDmQ8a3xZ".to_string(),
            date: None,
            text: String::new(),
            url: format!("{base}/large/{file}"),
            index: Some(index),
            kind: MediaKind::Photo,
        }
    }

    fn scheduler(concurrency: usize, max_retry: u32) -> DownloadScheduler {
        DownloadScheduler::new(HttpClient::new(), concurrency, max_retry)
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
    }

    async fn serve(server: &MockServer, file: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/large/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_new_rejects_out_of_range_concurrency() {
        assert!(matches!(
            DownloadScheduler::new(HttpClient::new(), 0, 1),
            Err(SchedulerError::InvalidConcurrency { value: 0 })
        ));
        assert!(DownloadScheduler::new(HttpClient::new(), 101, 1).is_err());
        let scheduler = DownloadScheduler::new(HttpClient::new(), 100, 3).unwrap();
        assert_eq!(scheduler.concurrency(), 100);
        assert_eq!(scheduler.max_retry(), 3);
    }

    #[tokio::test]
    async fn test_run_downloads_every_resource() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        for file in ["a.jpg", "b.jpg", "c.jpg"] {
            serve(&server, file, file.as_bytes()).await;
        }
        let album = TempDir::new().unwrap();
        let resources = vec![
            photo(&server.uri(), "a.jpg", 1),
            photo(&server.uri(), "b.jpg", 2),
            photo(&server.uri(), "c.jpg", 3),
        ];
        let progress = RecordingProgress::default();
        let ctx = Arc::new(RunContext::new());

        let report = scheduler(2, 1)
            .run(resources, album.path(), &NameTemplate::default(), &ctx, &progress)
            .await;

        assert_eq!(report.succeeded, 3);
        assert!(report.failed.is_empty());
        assert_eq!(report.rounds, 1);
        assert!(!report.cancelled);
        assert_eq!(std::fs::read(album.path().join("b.jpg")).unwrap(), b"b.jpg");
        assert!(progress.contains("Success 3, failure 0, total 3"));
        assert!(progress.contains("All tasks done 3/3(100%)"));
        assert!(progress.contains("finished in"));
        assert_eq!(ctx.downloaded_bytes(), 15);
    }

    #[tokio::test]
    async fn test_existing_files_make_no_requests() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let album = TempDir::new().unwrap();
        std::fs::write(album.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(album.path().join("b.jpg"), b"b").unwrap();
        let resources = vec![
            photo(&server.uri(), "a.jpg", 1),
            photo(&server.uri(), "b.jpg", 2),
        ];

        let report = scheduler(4, 2)
            .run(
                resources,
                album.path(),
                &NameTemplate::default(),
                &Arc::new(RunContext::new()),
                &RecordingProgress::default(),
            )
            .await;

        assert_eq!(report.succeeded, 2);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_downloads_existing_files_again() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        serve(&server, "a.jpg", b"fresh").await;
        let album = TempDir::new().unwrap();
        std::fs::write(album.path().join("a.jpg"), b"stale").unwrap();

        let report = scheduler(1, 0)
            .with_overwrite(true)
            .run(
                vec![photo(&server.uri(), "a.jpg", 1)],
                album.path(),
                &NameTemplate::default(),
                &Arc::new(RunContext::new()),
                &RecordingProgress::default(),
            )
            .await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(std::fs::read(album.path().join("a.jpg")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_persistent_redirect_fails_after_every_round() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/large/moved.jpg"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/other.jpg"))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/other.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;
        let album = TempDir::new().unwrap();
        let progress = RecordingProgress::default();

        let report = scheduler(1, 2)
            .run(
                vec![photo(&server.uri(), "moved.jpg", 1)],
                album.path(),
                &NameTemplate::default(),
                &Arc::new(RunContext::new()),
                &progress,
            )
            .await;

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.rounds, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "moved.jpg");
        assert!(report.failed[0].error.contains("got redirected to"));
        assert!(progress.contains("Automatic retry 2"));
        assert!(!album.path().join("moved.jpg").exists());
        for n in 1..=3 {
            assert!(album.path().join(format!("[broken {n}]moved.jpg")).exists());
        }
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_in_next_round() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/large/flaky.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        serve(&server, "flaky.jpg", b"ok").await;
        let album = TempDir::new().unwrap();
        let progress = RecordingProgress::default();

        let report = scheduler(1, 3)
            .run(
                vec![photo(&server.uri(), "flaky.jpg", 1)],
                album.path(),
                &NameTemplate::default(),
                &Arc::new(RunContext::new()),
                &progress,
            )
            .await;

        assert_eq!(report.succeeded, 1);
        assert!(report.failed.is_empty());
        assert_eq!(report.rounds, 2);
        assert!(progress.contains("Success 0, failure 1, total 1"));
        assert!(progress.contains("Automatic retry 1"));
        assert!(progress.contains("Success 1, failure 0, total 1"));
    }

    #[tokio::test]
    async fn test_placeholder_is_not_retried() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/large/gone.jpg"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/images/default_d_large.gif"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/images/default_d_large.gif"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a".to_vec()))
            .mount(&server)
            .await;
        let album = TempDir::new().unwrap();

        let report = scheduler(1, 5)
            .run(
                vec![photo(&server.uri(), "gone.jpg", 1)],
                album.path(),
                &NameTemplate::default(),
                &Arc::new(RunContext::new()),
                &RecordingProgress::default(),
            )
            .await;

        assert_eq!(report.rounds, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("no longer available"));
        assert!(album.path().join("[broken 1]gone.jpg").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_downloads_nothing() {
        let album = TempDir::new().unwrap();
        let ctx = Arc::new(RunContext::new());
        ctx.cancel();

        let report = scheduler(2, 2)
            .run(
                vec![photo("http://127.0.0.1:9", "a.jpg", 1)],
                album.path(),
                &NameTemplate::default(),
                &ctx,
                &RecordingProgress::default(),
            )
            .await;

        assert!(report.cancelled);
        assert_eq!(report.rounds, 0);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].error, NOT_STARTED);
    }

    #[tokio::test]
    async fn test_cancel_lets_running_download_finish() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/large/slow.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .set_delay(Duration::from_millis(400)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/large/queued.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let album = TempDir::new().unwrap();
        let ctx = Arc::new(RunContext::new());
        let progress = RecordingProgress::default();
        let canceller = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ctx.cancel();
            })
        };

        let report = scheduler(1, 3)
            .run(
                vec![
                    photo(&server.uri(), "slow.jpg", 1),
                    photo(&server.uri(), "queued.jpg", 2),
                ],
                album.path(),
                &NameTemplate::default(),
                &ctx,
                &progress,
            )
            .await;
        canceller.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "queued.jpg");
        assert!(album.path().join("slow.jpg").exists());
        assert!(progress.contains("waiting for cancellation..."));
        assert!(!progress.contains("Success"));
    }
}
