//! File name templates for downloaded resources.
//!
//! A template is plain text with `{key}` or `{key:spec}` placeholders:
//!
//! | Key | Value |
//! |-----|-------|
//! | `name` | last URL path segment, query removed |
//! | `date` | post date, `spec` is a strftime pattern (default `YYYY-MM-DD`) |
//! | `index` | 1-based position in the post, zero-padded to `spec` digits |
//! | `text` | normalized caption, at most 100 characters |
//! | `uid`, `mid`, `bid`, `type`, `url` | raw resource fields |
//!
//! Unknown keys, and keys the resource has no value for (such as `index` on
//! a video), are kept as literal `{key:spec}` text. The rendered name is
//! passed through [`sanitize_file_name`].

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveTime};
use regex::{Captures, Regex};

use super::filename::{file_name_from_url, sanitize_file_name};
use crate::resource::Resource;

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "{name}";

/// Maximum caption length in characters.
const TEXT_LIMIT: usize = 100;

/// Copyright notice some accounts append to every post.
const BOILERPLATE: &str = "無断転載禁止";

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(.*?)\}").expect("placeholder regex is valid"));

#[allow(clippy::expect_used)]
static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</*(img|span|a).*?>").expect("inline tag regex is valid"));

// `#topic#`, optionally `#topic[超话]#` for super-topics.
#[allow(clippy::expect_used)]
static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(.+?)(\[?超话\]?)?#").expect("hashtag regex is valid"));

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// A parsed naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    template: String,
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl NameTemplate {
    /// Wraps a template string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Renders the file name for `resource`.
    ///
    /// # Example
    ///
    /// ```
    /// use weibo_downloader_core::download::NameTemplate;
    /// use weibo_downloader_core::resource::{MediaKind, Resource};
    ///
    /// let resource = Resource {
    ///     uid: "1234567890".into(),
    ///     mid: 1,
    ///     bid: "1".into(),
    ///     date: None,
    ///     text: String::new(),
    ///     url: "https://x/y/img.jpg?x=1".into(),
    ///     index: Some(2),
    ///     kind: MediaKind::Photo,
    /// };
    /// assert_eq!(NameTemplate::new("{index:3}_{name}").render(&resource), "002_img.jpg");
    /// ```
    #[must_use]
    pub fn render(&self, resource: &Resource) -> String {
        let rendered = PLACEHOLDER.replace_all(&self.template, |caps: &Captures<'_>| {
            substitute(resource, &caps[1])
        });
        sanitize_file_name(&rendered)
    }
}

fn substitute(resource: &Resource, placeholder: &str) -> String {
    let (key, spec) = match placeholder.split_once(':') {
        Some((key, spec)) => (key, Some(spec)),
        None => (placeholder, None),
    };
    let value = match key {
        "name" => Some(file_name_from_url(&resource.url)),
        "date" => resource.date.and_then(|date| format_date(date, spec)),
        "index" => resource.index.and_then(|index| pad_index(index, spec)),
        "text" => Some(normalize_text(&resource.text)),
        "uid" => Some(resource.uid.clone()),
        "mid" => Some(resource.mid.to_string()),
        "bid" => Some(resource.bid.clone()),
        "url" => Some(resource.url.clone()),
        "type" | "kind" => Some(resource.kind.to_string()),
        _ => None,
    };
    value.unwrap_or_else(|| format!("{{{placeholder}}}"))
}

fn format_date(date: NaiveDate, spec: Option<&str>) -> Option<String> {
    let Some(spec) = spec else {
        return Some(date.to_string());
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(spec).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    // Offset and timezone fields have nothing to render from and fail here.
    write!(
        out,
        "{}",
        date.and_time(NaiveTime::MIN).format_with_items(items.iter())
    )
    .ok()?;
    Some(out)
}

fn pad_index(index: u32, spec: Option<&str>) -> Option<String> {
    let width = match spec {
        None => 0,
        Some(spec) => spec.trim().parse::<usize>().ok()?,
    };
    Some(format!("{index:0width$}"))
}

/// Normalizes a post caption for use in a file name.
///
/// Line breaks become spaces; `img`, `span` and `a` tags are removed along
/// with the copyright boilerplate and zero-width spaces; `&amp;` and
/// `&quot;` are unescaped; `#topic#` becomes ` topic `; whitespace runs
/// collapse to one space. Trailing whitespace is dropped and the result is
/// cut to 100 characters. Leading whitespace is kept, so a caption that
/// starts with a hashtag starts with a space.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let value = raw.replace("<br />", " ");
    let value = INLINE_TAG.replace_all(&value, "");
    let value = value
        .replace(BOILERPLATE, "")
        .replace('\u{200b}', "")
        .replace("&amp;", "&")
        .replace("&quot;", "＂");
    let value = HASHTAG.replace_all(&value, " ${1} ");
    let value = WHITESPACE.replace_all(&value, " ");
    value.trim_end().chars().take(TEXT_LIMIT).collect()
}
