//! The per-account run loop.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, instrument, warn};

use weibo_downloader_core::download::sanitize_file_name;
use weibo_downloader_core::feed::{Account, Termination, resolve_account};
use weibo_downloader_core::resource::{load_dump, write_dump};
use weibo_downloader_core::{
    DownloadScheduler, FeedApi, FeedPaginator, OverflowSource, ProgressSink, Resource,
    ResourceExtractor, RunContext,
};

use crate::ProcessExit;
use crate::app::config::RunConfig;

const SEPARATOR_WIDTH: usize = 30;

/// Runs every account of `config` against `api`.
///
/// `ctx` carries the cancellation signal; once it fires, the account in
/// progress is abandoned and the run ends with [`ProcessExit::Cancelled`].
#[instrument(skip_all, fields(users = config.users.len()))]
pub(crate) async fn run<A>(
    config: &RunConfig,
    api: Arc<A>,
    ctx: &Arc<RunContext>,
    progress: &dyn ProgressSink,
) -> Result<ProcessExit>
where
    A: FeedApi + OverflowSource + 'static,
{
    let scheduler = DownloadScheduler::new(
        config.media_client.clone(),
        config.concurrency,
        config.max_retry,
    )?
    .with_overwrite(config.overwrite);
    let feed: Arc<dyn FeedApi> = Arc::clone(&api) as Arc<dyn FeedApi>;
    let extractor = ResourceExtractor::new(api as Arc<dyn OverflowSource>, config.include_video);
    let paginator = FeedPaginator::new(
        Arc::clone(&feed),
        extractor,
        config.range,
        config.paginator.clone(),
    );

    tokio::fs::create_dir_all(&config.directory)
        .await
        .with_context(|| format!("cannot create {}", config.directory.display()))?;

    let mut watermarks: BTreeMap<String, String> = BTreeMap::new();
    let total = config.users.len();

    for (number, user) in config.users.iter().enumerate() {
        if ctx.is_cancelled() {
            break;
        }
        progress.line(
            &format!("{}/{total} {}", number + 1, Local::now().format("%a %b %e %H:%M:%S %Y")),
            false,
        );

        let account = match resolve_account(feed.as_ref(), user).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                invalid_account(user, progress);
                continue;
            }
            Err(error) => {
                warn!(user = %user, error = %error, "account lookup failed");
                invalid_account(user, progress);
                continue;
            }
        };
        progress.line(&format!("{} {}", account.display_name(), account.uid), false);

        let Some((name, resources)) = account_resources(
            config,
            &paginator,
            &account,
            &mut watermarks,
            ctx,
            progress,
        )
        .await?
        else {
            break;
        };

        if let Some(dir) = &config.dump_dir {
            dump_resources(dir, &account.uid, &resources).await;
        }

        let album = config.directory.join(sanitize_file_name(&name));
        if !resources.is_empty() {
            tokio::fs::create_dir_all(&album)
                .await
                .with_context(|| format!("cannot create {}", album.display()))?;
        }

        let report = scheduler
            .run(resources, &album, &config.template, ctx, progress)
            .await;
        if report.cancelled {
            break;
        }
        info!(
            uid = %account.uid,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            total = report.total,
            rounds = report.rounds,
            "account finished"
        );
        for failure in &report.failed {
            progress.line(&format!("{} {} failed", failure.resource.url, failure.name), false);
        }
        progress.line(&"-".repeat(SEPARATOR_WIDTH), false);
    }

    if ctx.is_cancelled() {
        warn!(
            downloaded_bytes = ctx.downloaded_bytes(),
            "Interrupted. Run again to continue."
        );
        return Ok(ProcessExit::Cancelled);
    }

    progress.line("Done!", false);
    if let Some(path) = &config.watermark {
        write_watermarks(path, &watermarks).await?;
    }
    Ok(ProcessExit::Success)
}

fn invalid_account(user: &str, progress: &dyn ProgressSink) {
    progress.line(&format!("Invalid account {user}"), false);
    progress.line(&"-".repeat(SEPARATOR_WIDTH), false);
}

/// The album name and resources of one account, or `None` when the run was
/// cancelled during pagination.
async fn account_resources(
    config: &RunConfig,
    paginator: &FeedPaginator,
    account: &Account,
    watermarks: &mut BTreeMap<String, String>,
    ctx: &RunContext,
    progress: &dyn ProgressSink,
) -> Result<Option<(String, Vec<Resource>)>> {
    let name = account.display_name();
    if let Some(file) = &config.resource_file {
        let resources = load_dump(file)
            .await
            .with_context(|| format!("cannot load resource list {}", file.display()))?;
        debug!(count = resources.len(), "loaded resource list");
        return Ok(Some((name, resources)));
    }

    let harvest = paginator.collect(&account.uid, progress, ctx).await;
    if harvest.termination == Termination::Cancelled {
        return Ok(None);
    }
    if let Some(bid) = harvest.newest_bid {
        watermarks.insert(account.uid.clone(), bid);
    }
    Ok(Some((harvest.screen_name.unwrap_or(name), harvest.resources)))
}

async fn dump_resources(dir: &Path, uid: &str, resources: &[Resource]) {
    let path = dir.join(format!("{uid}.json"));
    if let Err(error) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %error, "cannot create dump directory");
        return;
    }
    match write_dump(&path, resources).await {
        Ok(()) => info!(path = %path.display(), count = resources.len(), "resource list written"),
        Err(error) => warn!(error = %error, "resource list not written"),
    }
}

async fn write_watermarks(path: &Path, watermarks: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(watermarks)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("cannot write watermark file {}", path.display()))?;
    info!(path = %path.display(), accounts = watermarks.len(), "watermarks written");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use crate::socket_guard::start_mock_server_or_skip;
    use clap::Parser;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use weibo_downloader_core::{HttpClient, WeiboClient};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Lines {
        fn unpinned(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ProgressSink for Lines {
        fn line(&self, message: &str, pin: bool) {
            if !pin {
                self.0.lock().unwrap().push(message.to_string());
            }
        }
    }

    fn config(dir: &Path, extra: &[&str]) -> RunConfig {
        let root = dir.join("album-root").to_string_lossy().into_owned();
        let mut argv = vec!["weibo-downloader", "-d", root.as_str(), "-i", "0", "-r", "0"];
        argv.extend_from_slice(extra);
        RunConfig::from_args(&Args::try_parse_from(argv).unwrap()).unwrap()
    }

    fn api(server: &MockServer) -> Arc<WeiboClient> {
        Arc::new(WeiboClient::new(HttpClient::for_api(), None).with_base_url(server.uri()))
    }

    async fn mount_account(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/container/getIndex"))
            .and(query_param("type", "uid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"ok": 1, "data": {"userInfo": {"screen_name": "lookup-name"}}}),
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/container/getIndex"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": 1,
                "data": {
                    "cardlistInfo": {"total": 1},
                    "cards": [{
                        "scheme": format!("{}/status/KDmQ8a3xZ", server.uri()),
                        "mblog": {
                            "mid": "4693825922396919", "bid": "KDmQ8a3xZ",
                            "created_at": "2024-05-01", "raw_text": "hello",
                            "pic_num": 1,
                            "pics": [{"large": {"url": format!("{}/large/a.jpg", server.uri())}}],
                            "user": {"id": 1234567890, "screen_name": "feed-name"}
                        }
                    }]
                }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/container/getIndex"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": 0, "data": {"cards": []}})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/large/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_run_downloads_into_feed_screen_name_album() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_account(&server).await;
        let dir = TempDir::new().unwrap();
        let watermark = dir.path().join("marks.json").to_string_lossy().into_owned();
        let dump = dir.path().join("dump").to_string_lossy().into_owned();
        let config = config(
            dir.path(),
            &["-u", "1234567890", "--watermark", watermark.as_str(), "--dump", dump.as_str()],
        );
        let lines = Lines::default();

        let exit = run(&config, api(&server), &Arc::new(RunContext::new()), &lines)
            .await
            .unwrap();

        assert_eq!(exit, ProcessExit::Success);
        let saved = config.directory.join("feed-name").join("a.jpg");
        assert_eq!(std::fs::read(saved).unwrap(), b"jpeg");

        let marks: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&watermark).unwrap()).unwrap();
        assert_eq!(marks, json!({"1234567890": "KDmQ8a3xZ"}));
        assert!(dir.path().join("dump").join("1234567890.json").is_file());

        let lines = lines.unpinned();
        assert!(lines[0].starts_with("1/1 "));
        assert_eq!(lines[1], "lookup-name 1234567890");
        assert!(lines.contains(&"Success 1, failure 0, total 1".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("Done!"));
    }

    #[tokio::test]
    async fn test_run_reports_invalid_account_and_continues() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/n/nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), &["-u", "nobody"]);
        let lines = Lines::default();

        let exit = run(&config, api(&server), &Arc::new(RunContext::new()), &lines)
            .await
            .unwrap();

        assert_eq!(exit, ProcessExit::Success);
        assert_eq!(
            lines.unpinned()[1..],
            ["Invalid account nobody".to_string(), "-".repeat(30), "Done!".to_string()]
        );
        assert_eq!(std::fs::read_dir(&config.directory).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_from_resource_list_skips_pagination() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        mount_account(&server).await;
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("list.json");
        let resource = json!([{
            "uid": "1234567890", "mid": 1, "bid": "1", "date": "2024-05-01",
            "text": "", "url": format!("{}/large/a.jpg", server.uri()),
            "index": 1, "type": "photo"
        }]);
        std::fs::write(&list, resource.to_string()).unwrap();
        let list = list.to_string_lossy().into_owned();
        let config = config(dir.path(), &["-u", "1234567890", "-R", list.as_str()]);

        let exit = run(&config, api(&server), &Arc::new(RunContext::new()), &Lines::default())
            .await
            .unwrap();

        assert_eq!(exit, ProcessExit::Success);
        assert!(config.directory.join("lookup-name").join("a.jpg").is_file());
        let requests = server.received_requests().await.unwrap();
        assert!(
            requests
                .iter()
                .all(|request| request.url.query_pairs().all(|(key, _)| key != "page"))
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_exits_with_cancelled() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), &["-u", "1234567890"]);
        let ctx = Arc::new(RunContext::new());
        ctx.cancel();
        let api = Arc::new(
            WeiboClient::new(HttpClient::new_with_timeouts(1, 1), None)
                .with_base_url("http://127.0.0.1:9"),
        );
        let lines = Lines::default();

        let exit = tokio::time::timeout(Duration::from_secs(5), run(&config, api, &ctx, &lines))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(exit, ProcessExit::Cancelled);
        assert!(lines.unpinned().is_empty());
    }
}
