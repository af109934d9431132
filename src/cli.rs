//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use weibo_downloader_core::download::DEFAULT_TEMPLATE;
use weibo_downloader_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRY};

/// Incrementally mirror the photos and videos of Weibo accounts.
///
/// Walks each account's mobile feed newest first, keeps the posts inside
/// the boundary, and downloads their media into `<directory>/<screen name>/`.
#[derive(Parser, Debug)]
#[command(name = "weibo-downloader")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("accounts").required(true).args(["users", "files"])))]
pub struct Args {
    /// Account identifiers (10 digits) or display names
    #[arg(short = 'u', long, num_args = 1.., value_name = "USER")]
    pub users: Vec<String>,

    /// Files listing one account per line
    #[arg(short = 'f', long, num_args = 1.., value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Saving root; each account gets a sub-directory
    #[arg(short = 'd', long, value_name = "DIR", default_value = "weiboPic")]
    pub directory: PathBuf,

    /// Parallel downloads (1-100)
    #[arg(short = 's', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub size: u8,

    /// Automatic retry rounds for failed downloads
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRY)]
    pub retry: u32,

    /// Pause after every feed page request, in seconds
    #[arg(short = 'i', long, value_name = "SECS", default_value_t = 1.0, allow_negative_numbers = true)]
    pub interval: f64,

    /// Value of the SUB session cookie
    #[arg(short = 'c', long, value_name = "SUB")]
    pub cookie: Option<String>,

    /// Post window `low:high`: ids, short ids or `@YYYYMMDD` dates, either side may be empty
    #[arg(short = 'b', long, value_name = "SPEC", default_value = ":", allow_hyphen_values = true)]
    pub boundary: String,

    /// Download a dumped resource list instead of walking the feed
    #[arg(short = 'R', long, value_name = "FILE")]
    pub resource: Option<PathBuf>,

    /// File name template: {name} {date[:fmt]} {index[:width]} {text} {uid} {mid} {bid} {type} {url}
    #[arg(short = 'n', long, value_name = "TEMPLATE", default_value = DEFAULT_TEMPLATE)]
    pub name: String,

    /// Also download videos
    #[arg(short = 'v', long)]
    pub video: bool,

    /// Overwrite existing files
    #[arg(short = 'o', long)]
    pub overwrite: bool,

    /// Proxy for media downloads, `(http|https|socks5)://[user:pass@]host[:port]`; empty disables proxies
    #[arg(short = 'p', long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Write each account's resource list to `<DIR>/<uid>.json`
    #[arg(long, value_name = "DIR")]
    pub dump: Option<PathBuf>,

    /// Write the newest post id of every account to this JSON file
    #[arg(long, value_name = "FILE")]
    pub watermark: Option<PathBuf>,

    /// Increase log verbosity (--verbose for debug, twice for trace)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
