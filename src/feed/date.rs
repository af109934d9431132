//! Post date parsing.
//!
//! The feed writes `created_at` in several forms depending on the post's
//! age: relative (`5分钟前`, `3小时前`, `刚刚`, `昨天 12:30`), month-day for
//! this year (`05-01`), a full date for older posts (`2021-10-03`), and
//! the API's long form (`Sat Oct 12 10:00:00 +0800 2024`).

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

const LONG_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[allow(clippy::expect_used)]
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digits regex is valid"));

#[allow(clippy::expect_used)]
static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}-\d{1,2}$").expect("month-day regex is valid"));

/// Calendar date of a post, relative to `now`.
///
/// Returns `None` for text in none of the known forms.
#[must_use]
pub fn parse_created_at(text: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    let text = text.trim();
    if text.contains('前') {
        if text.contains("小时") {
            let hours: i64 = DIGITS.find(text)?.as_str().parse().ok()?;
            return Some(now.checked_sub_signed(Duration::try_hours(hours)?)?.date());
        }
        return Some(now.date());
    }
    if text.contains("刚刚") {
        return Some(now.date());
    }
    if text.contains("昨天") {
        return now.date().pred_opt();
    }
    if let Ok(moment) = DateTime::parse_from_str(text, LONG_FORMAT) {
        return Some(moment.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if MONTH_DAY.is_match(text) {
        return NaiveDate::parse_from_str(&format!("{}-{text}", now.year()), "%Y-%m-%d").ok();
    }
    None
}
