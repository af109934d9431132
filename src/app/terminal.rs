//! Terminal detection and tracing setup.

/// Log level used unless `RUST_LOG` says otherwise.
pub(crate) fn default_log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

/// Whether status lines get a live progress line on stderr.
pub(crate) fn should_use_progress_line(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level_quiet_wins() {
        assert_eq!(default_log_level(true, 3), "error");
        assert_eq!(default_log_level(false, 0), "info");
        assert_eq!(default_log_level(false, 1), "debug");
        assert_eq!(default_log_level(false, 2), "trace");
        assert_eq!(default_log_level(false, 7), "trace");
    }

    #[test]
    fn test_progress_line_requires_interactive_stderr() {
        assert!(should_use_progress_line(true, false, false));
        assert!(!should_use_progress_line(false, false, false));
        assert!(!should_use_progress_line(true, true, false));
        assert!(!should_use_progress_line(true, false, true));
    }
}
