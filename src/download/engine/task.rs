//! One resource download: skip-if-present, streaming fetch, integrity
//! checks, and quarantine of anything that did not verify.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use tokio::fs::File;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};
use url::Url;

use super::super::client::{DispatchOptions, HttpClient, stream_to_file};
use super::super::constants::PLACEHOLDER_MARKER;
use super::super::error::DownloadError;
use super::super::filename::quarantine;
use crate::context::RunContext;
use crate::resource::Resource;

/// A resource bound to its destination for one retry round.
#[derive(Debug, Clone)]
pub(crate) struct DownloadTask {
    pub(crate) resource: Resource,
    pub(crate) destination: PathBuf,
    /// 1-based round number.
    pub(crate) attempt: u32,
}

/// Facts about a finished transfer, for the completion line.
#[derive(Debug, Clone)]
pub(crate) struct Transfer {
    pub(crate) final_url: String,
    pub(crate) bytes: u64,
    pub(crate) elapsed: Duration,
    pub(crate) run_total_bytes: u64,
}

/// What a worker hands back to the coordinator.
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Downloaded(Transfer),
    AlreadyPresent,
    Failed(DownloadError),
    /// The run was cancelled before this task got a worker slot.
    Cancelled,
}

/// Waits for a worker slot, unless the run is cancelled first, then
/// downloads. A started download always runs to completion.
pub(crate) async fn run_task(
    client: HttpClient,
    task: DownloadTask,
    overwrite: bool,
    ctx: Arc<RunContext>,
    slots: Arc<Semaphore>,
) -> TaskOutcome {
    let permit = tokio::select! {
        biased;
        () = ctx.cancel_token().cancelled() => return TaskOutcome::Cancelled,
        permit = slots.acquire_owned() => permit,
    };
    let Ok(_permit) = permit else {
        return TaskOutcome::Cancelled;
    };

    match download_resource(&client, &task, overwrite, &ctx).await {
        Ok(Some(transfer)) => TaskOutcome::Downloaded(transfer),
        Ok(None) => TaskOutcome::AlreadyPresent,
        Err(error) => TaskOutcome::Failed(error),
    }
}

/// Downloads one resource to its destination.
///
/// Returns `Ok(None)` without touching the network when the destination
/// exists and `overwrite` is off. On any failure an existing file at the
/// destination is renamed to `[broken N]name`.
#[instrument(
    skip(client, task, ctx),
    fields(url = %task.resource.url, path = %task.destination.display(), attempt = task.attempt)
)]
pub(crate) async fn download_resource(
    client: &HttpClient,
    task: &DownloadTask,
    overwrite: bool,
    ctx: &RunContext,
) -> Result<Option<Transfer>, DownloadError> {
    if !overwrite
        && tokio::fs::try_exists(&task.destination)
            .await
            .unwrap_or(false)
    {
        debug!("destination exists, skipping");
        return Ok(None);
    }

    let started = Instant::now();
    match fetch_to_file(client, &task.resource.url, &task.destination).await {
        Ok((final_url, bytes)) => {
            let run_total_bytes = ctx.record_bytes(bytes);
            debug!(bytes, "download verified");
            Ok(Some(Transfer {
                final_url,
                bytes,
                elapsed: started.elapsed(),
                run_total_bytes,
            }))
        }
        Err(error) => {
            debug!(error = %error, "download failed");
            if let Err(io_error) = quarantine(&task.destination).await {
                warn!(error = %io_error, "broken file left in place");
            }
            Err(error)
        }
    }
}

async fn fetch_to_file(
    client: &HttpClient,
    url: &str,
    path: &Path,
) -> Result<(String, u64), DownloadError> {
    let requested = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let response = client
        .dispatch(Method::GET, url, &DispatchOptions::default())
        .await?;
    let final_url = response.url().clone();
    let expected_bytes = response.content_length();

    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let written = stream_to_file(&mut file, response, url, path).await?;

    verify_transfer(url, &requested, &final_url, path, expected_bytes, written)?;

    Ok((final_url.into(), written))
}

/// Checks a finished transfer against what was asked for.
///
/// In order: the final URL must not be the CDN placeholder, must not differ
/// from the requested one, and the bytes written must match the declared
/// `Content-Length` when the server sent one.
fn verify_transfer(
    url: &str,
    requested: &Url,
    final_url: &Url,
    path: &Path,
    expected_bytes: Option<u64>,
    written: u64,
) -> Result<(), DownloadError> {
    if final_url.as_str().contains(PLACEHOLDER_MARKER) {
        return Err(DownloadError::placeholder(url, final_url.as_str()));
    }
    if final_url != requested {
        return Err(DownloadError::redirected(url, final_url.as_str()));
    }
    if let Some(expected) = expected_bytes
        && expected != written
    {
        return Err(DownloadError::integrity(path, expected, written));
    }
    Ok(())
}
