//! CLI entry point for the Weibo feed mirror.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weibo_downloader_core::{HttpClient, RunContext, WeiboClient};

mod app;
mod cli;
#[cfg(test)]
#[path = "../tests/support/socket_guard.rs"]
mod socket_guard;

use app::config::RunConfig;
use app::progress::ConsoleProgress;
use app::{runtime, terminal};
use cli::Args;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every account was processed; individual downloads may have failed.
    Success,
    /// Fatal configuration or I/O error.
    Failure,
    /// Interrupted by Ctrl-C.
    Cancelled,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Cancelled => 130,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    terminal::init_tracing(terminal::default_log_level(args.quiet, args.verbose));
    debug!(?args, "CLI arguments parsed");

    let exit = match run(&args).await {
        Ok(exit) => exit,
        Err(err) => {
            error!("{err:#}");
            ProcessExit::Failure
        }
    };
    ExitCode::from(exit.code())
}

async fn run(args: &Args) -> Result<ProcessExit> {
    let config = RunConfig::from_args(args)?;
    info!(users = config.users.len(), directory = %config.directory.display(), "Weibo downloader starting");

    let interrupt = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(interrupt.clone()));
    let ctx = Arc::new(RunContext::with_token(interrupt));

    let api = Arc::new(WeiboClient::new(HttpClient::for_api(), config.token.clone()));
    let progress = ConsoleProgress::new(terminal::should_use_progress_line(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    ));

    let outcome = runtime::run(&config, api, &ctx, &progress).await;
    progress.finish();
    outcome
}

/// Cancels `token` on the first Ctrl-C.
async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, stopping");
            token.cancel();
        }
        Err(err) => warn!(error = %err, "cannot listen for Ctrl-C"),
    }
}
