//! Assembly of the account list from `-u` values or user files.

use std::path::Path;

use anyhow::{Context, Result};

/// Reads one user per line, trimming whitespace and skipping blank lines.
pub(crate) fn read_user_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read user file {}", path.display()))?;
    Ok(parse_user_lines(&text))
}

pub(crate) fn parse_user_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Users named on the command line, or else the concatenated user files.
pub(crate) fn collect_users(users: &[String], files: &[impl AsRef<Path>]) -> Result<Vec<String>> {
    if !users.is_empty() {
        return Ok(users
            .iter()
            .map(|user| user.trim().to_string())
            .filter(|user| !user.is_empty())
            .collect());
    }
    let mut all = Vec::new();
    for file in files {
        all.extend(read_user_file(file.as_ref())?);
    }
    Ok(all)
}
