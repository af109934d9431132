//! File name helpers: URL-derived names, lossless sanitization, and
//! quarantine paths for broken downloads.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

/// Characters that are illegal in file names on common filesystems, paired
/// with the full-width look-alikes they are mapped to.
const ILLEGAL_CHARACTERS: [(char, char); 9] = [
    ('\\', '＼'),
    ('/', '／'),
    (':', '：'),
    ('*', '＊'),
    ('?', '？'),
    ('"', '＂'),
    ('<', '＜'),
    ('>', '＞'),
    ('|', '｜'),
];

/// Prefix given to quarantined files: `[broken N]name`.
const QUARANTINE_PREFIX: &str = "[broken ";

/// Last path segment of a media URL with the query string removed.
///
/// `https://wx1.sinaimg.cn/large/abc.jpg?KID=1` gives `abc.jpg`.
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url)
        && let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        return last.to_string();
    }

    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

/// Maps filesystem-illegal characters to full-width equivalents.
///
/// The mapping is one-to-one and idempotent. A name that would still resolve
/// to a special path component (`.`, `..` or nothing) has its dots replaced.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            ILLEGAL_CHARACTERS
                .iter()
                .find_map(|&(illegal, replacement)| (illegal == c).then_some(replacement))
                .unwrap_or(c)
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if is_plain_file_name(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "．")
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// First free `[broken N]name` path next to `path`, counting from 1.
#[must_use]
pub fn quarantine_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut index: u32 = 1;
    loop {
        let candidate = path.with_file_name(format!("{QUARANTINE_PREFIX}{index}]{name}"));
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Moves an existing file out of the way so it is never overwritten.
///
/// Returns the quarantine path, or `None` when nothing existed at `path`.
///
/// # Errors
///
/// Returns the IO error when the rename fails.
pub async fn quarantine(path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let target = quarantine_path(path);
    match tokio::fs::rename(path, &target).await {
        Ok(()) => {
            debug!(from = %path.display(), to = %target.display(), "quarantined broken file");
            Ok(Some(target))
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "failed to quarantine broken file");
            Err(error)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_from_url_strips_query() {
        assert_eq!(file_name_from_url("https://x/y/img.jpg?x=1"), "img.jpg");
        assert_eq!(
            file_name_from_url("https://wx1.sinaimg.cn/large/006abc.jpg"),
            "006abc.jpg"
        );
        assert_eq!(
            file_name_from_url("https://f.video.weibocdn.com/o0/abc.mp4?label=mp4_720p&Expires=1"),
            "abc.mp4"
        );
    }

    #[test]
    fn test_file_name_from_url_handles_unparseable_input() {
        assert_eq!(file_name_from_url("no-scheme/dir/pic.gif?a=b"), "pic.gif");
    }

    #[test]
    fn test_sanitize_maps_to_full_width() {
        assert_eq!(
            sanitize_file_name(r#"a\b/c:d*e?f"g<h>i|j"#),
            "a＼b／c：d＊e？f＂g＜h＞i｜j"
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_file_name(r#"2024/01/02 "quote" <tag>?.jpg"#);
        assert_eq!(sanitize_file_name(&once), once);
    }

    #[test]
    fn test_sanitize_keeps_names_inside_directory() {
        assert_eq!(sanitize_file_name(".."), "．．");
        assert_eq!(sanitize_file_name(""), "_");
        assert_eq!(sanitize_file_name("a.jpg"), "a.jpg");
    }

    #[test]
    fn test_quarantine_path_skips_existing_indices() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.jpg");
        assert_eq!(quarantine_path(&target), dir.path().join("[broken 1]a.jpg"));

        std::fs::write(dir.path().join("[broken 1]a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("[broken 2]a.jpg"), b"x").unwrap();
        assert_eq!(quarantine_path(&target), dir.path().join("[broken 3]a.jpg"));
    }

    #[tokio::test]
    async fn test_quarantine_renames_and_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.jpg");

        assert_eq!(quarantine(&target).await.unwrap(), None);

        std::fs::write(&target, b"first").unwrap();
        let first = quarantine(&target).await.unwrap().unwrap();
        std::fs::write(&target, b"second").unwrap();
        let second = quarantine(&target).await.unwrap().unwrap();

        assert!(!target.exists());
        assert_eq!(std::fs::read(first).unwrap(), b"first");
        assert_eq!(std::fs::read(second).unwrap(), b"second");
        assert!(dir.path().join("[broken 2]a.jpg").exists());
    }
}
