//! Validation of CLI arguments into runtime settings.
//!
//! Everything here runs before the first network request, so a bad flag
//! fails the run without touching the feed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use weibo_downloader_core::feed::PaginatorConfig;
use weibo_downloader_core::{BoundaryRange, HttpClient, NameTemplate};

use crate::app::input;
use crate::cli::Args;

/// Validated settings of one run.
#[derive(Debug)]
pub(crate) struct RunConfig {
    pub(crate) users: Vec<String>,
    pub(crate) directory: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) max_retry: u32,
    pub(crate) paginator: PaginatorConfig,
    /// Full `Cookie` header value.
    pub(crate) token: Option<String>,
    pub(crate) range: BoundaryRange,
    pub(crate) resource_file: Option<PathBuf>,
    pub(crate) template: NameTemplate,
    pub(crate) include_video: bool,
    pub(crate) overwrite: bool,
    pub(crate) media_client: HttpClient,
    pub(crate) dump_dir: Option<PathBuf>,
    pub(crate) watermark: Option<PathBuf>,
}

impl RunConfig {
    pub(crate) fn from_args(args: &Args) -> Result<Self> {
        let users = input::collect_users(&args.users, &args.files)?;
        if users.is_empty() {
            bail!("no accounts given: the user list is empty");
        }

        ensure_directory_usable(&args.directory)?;

        let range = BoundaryRange::parse(&args.boundary)
            .with_context(|| format!("invalid id range {}", args.boundary))?;

        let interval = Duration::try_from_secs_f64(args.interval)
            .with_context(|| format!("invalid interval {}: expected seconds >= 0", args.interval))?;

        let media_client = HttpClient::with_proxy(args.proxy.as_deref())
            .with_context(|| format!("invalid proxy {}", args.proxy.as_deref().unwrap_or_default()))?;

        let token = args
            .cookie
            .as_deref()
            .map(str::trim)
            .filter(|cookie| !cookie.is_empty())
            .map(|cookie| format!("SUB={cookie}"));

        debug!(users = users.len(), %range, ?interval, "configuration validated");
        Ok(Self {
            users,
            directory: args.directory.clone(),
            concurrency: usize::from(args.size),
            max_retry: args.retry,
            paginator: PaginatorConfig {
                interval,
                ..PaginatorConfig::default()
            },
            token,
            range,
            resource_file: args.resource.clone(),
            template: NameTemplate::new(args.name.clone()),
            include_video: args.video,
            overwrite: args.overwrite,
            media_client,
            dump_dir: args.dump.clone(),
            watermark: args.watermark.clone(),
        })
    }
}

fn ensure_directory_usable(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        bail!("Saving path is not a directory: {}", path.display());
    }
    Ok(())
}
