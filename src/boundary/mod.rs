//! Inclusion window over post identifiers and dates.
//!
//! A [`BoundaryRange`] is parsed once per run from a `low:high` specification.
//! Each endpoint is either a post identifier (decimal mid, or a short bid that
//! is decoded with [`bid_to_mid`]) or a calendar date written `@YYYYMMDD`.
//! An empty endpoint is unbounded on its side.
//!
//! Posts are classified with [`BoundaryRange::classify`]:
//!
//! - `lower >= post` marks the post as at or below the floor. Pagination
//!   stops after the current page once any post trips the floor.
//! - `upper < post` marks the post as above the ceiling. It is skipped but
//!   does not stop pagination.
//!
//! Each endpoint compares against whichever representation of the post it
//! matches: numeric endpoints against the mid, date endpoints against the
//! post date. A date endpoint cannot exclude a post whose date is unknown.
//!
//! # Example
//!
//! ```
//! use weibo_downloader_core::boundary::{BoundaryRange, PostKey, Verdict};
//!
//! let range: BoundaryRange = "100:200".parse().unwrap();
//! assert_eq!(range.classify(&PostKey::new(250, None)), Verdict::AboveCeiling);
//! assert_eq!(range.classify(&PostKey::new(180, None)), Verdict::Include);
//! assert_eq!(range.classify(&PostKey::new(90, None)), Verdict::AtOrBelowFloor);
//! ```

mod bid;
mod error;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use tracing::debug;

pub use bid::bid_to_mid;
pub use error::BoundaryError;

/// Date endpoint marker and format (`@20240131`).
const DATE_FORMAT: &str = "%Y%m%d";

/// One endpoint of a [`BoundaryRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryValue {
    /// A post identifier (mid).
    Numeric(i64),
    /// A calendar date.
    Date(NaiveDate),
    /// No lower limit.
    UnboundedLow,
    /// No upper limit.
    UnboundedHigh,
}

/// The comparable representations of one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostKey {
    /// Numeric post identifier.
    pub mid: i64,
    /// Publication date, when the feed exposed a parseable one.
    pub date: Option<NaiveDate>,
}

impl PostKey {
    /// Creates a key from a mid and an optional date.
    #[must_use]
    pub fn new(mid: i64, date: Option<NaiveDate>) -> Self {
        Self { mid, date }
    }
}

impl BoundaryValue {
    /// Parses a non-empty endpoint.
    ///
    /// `@YYYYMMDD` is a date, an all-digit string is a decimal mid, anything
    /// else is decoded as a short bid.
    ///
    /// # Errors
    ///
    /// Returns a [`BoundaryError`] when the endpoint is not a valid date or
    /// identifier.
    pub fn parse_endpoint(raw: &str) -> Result<Self, BoundaryError> {
        if let Some(date) = raw.strip_prefix('@') {
            return NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map(Self::Date)
                .map_err(|_| BoundaryError::invalid_date(raw));
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw
                .parse::<i64>()
                .map(Self::Numeric)
                .map_err(|_| BoundaryError::overflow(raw));
        }
        bid_to_mid(raw).map(Self::Numeric)
    }

    /// Orders this endpoint relative to a post.
    ///
    /// Returns `None` when the endpoint's representation is not available
    /// for the post (a date endpoint against a post without a date). A
    /// `None` never excludes the post.
    #[must_use]
    pub fn compare_to(&self, post: &PostKey) -> Option<Ordering> {
        match self {
            Self::Numeric(mid) => Some(mid.cmp(&post.mid)),
            Self::Date(date) => post.date.map(|post_date| date.cmp(&post_date)),
            Self::UnboundedLow => Some(Ordering::Less),
            Self::UnboundedHigh => Some(Ordering::Greater),
        }
    }

    /// The value one unit before this one in its own representation.
    fn predecessor(self) -> Option<Self> {
        match self {
            Self::Numeric(mid) => mid.checked_sub(1).map(Self::Numeric),
            Self::Date(date) => date.pred_opt().map(Self::Date),
            unbounded => Some(unbounded),
        }
    }
}

impl fmt::Display for BoundaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(mid) => write!(f, "{mid}"),
            Self::Date(date) => write!(f, "@{}", date.format(DATE_FORMAT)),
            Self::UnboundedLow | Self::UnboundedHigh => Ok(()),
        }
    }
}

/// Classification of a post against a [`BoundaryRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Inside the window.
    Include,
    /// Newer than the upper endpoint; skipped.
    AboveCeiling,
    /// At or older than the lower endpoint; skipped, and pagination may stop.
    AtOrBelowFloor,
}

/// Inclusion window `{lower, upper}` over posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryRange {
    lower: BoundaryValue,
    upper: BoundaryValue,
}

impl Default for BoundaryRange {
    fn default() -> Self {
        Self {
            lower: BoundaryValue::UnboundedLow,
            upper: BoundaryValue::UnboundedHigh,
        }
    }
}

impl BoundaryRange {
    /// Parses a `low:high` specification.
    ///
    /// A specification without `:` names both endpoints. When both endpoints
    /// parse to the same value the lower one is moved back by one unit, so
    /// `X` alone selects everything strictly newer than `X`.
    ///
    /// # Errors
    ///
    /// Returns a [`BoundaryError`] for malformed endpoints, more than two
    /// endpoints, or a lower endpoint after the upper one.
    pub fn parse(spec: &str) -> Result<Self, BoundaryError> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (low, high) = match parts.as_slice() {
            [single] => (*single, *single),
            [low, high] => (*low, *high),
            _ => {
                return Err(BoundaryError::TooManyEndpoints {
                    spec: spec.to_string(),
                });
            }
        };

        let mut lower = if low.is_empty() {
            BoundaryValue::UnboundedLow
        } else {
            BoundaryValue::parse_endpoint(low)?
        };
        let upper = if high.is_empty() {
            BoundaryValue::UnboundedHigh
        } else {
            BoundaryValue::parse_endpoint(high)?
        };

        if lower == upper {
            lower = lower
                .predecessor()
                .ok_or_else(|| BoundaryError::overflow(low))?;
        }

        let inverted = match (lower, upper) {
            (BoundaryValue::Numeric(l), BoundaryValue::Numeric(u)) => l > u,
            (BoundaryValue::Date(l), BoundaryValue::Date(u)) => l > u,
            _ => false,
        };
        if inverted {
            return Err(BoundaryError::Inverted {
                spec: spec.to_string(),
            });
        }

        debug!(%lower, %upper, "boundary parsed");
        Ok(Self { lower, upper })
    }

    /// Lower (exclusive) endpoint.
    #[must_use]
    pub fn lower(&self) -> BoundaryValue {
        self.lower
    }

    /// Upper (inclusive) endpoint.
    #[must_use]
    pub fn upper(&self) -> BoundaryValue {
        self.upper
    }

    /// Classifies a post. The floor takes precedence over the ceiling.
    #[must_use]
    pub fn classify(&self, post: &PostKey) -> Verdict {
        let excluded_low = matches!(
            self.lower.compare_to(post),
            Some(Ordering::Greater | Ordering::Equal)
        );
        if excluded_low {
            return Verdict::AtOrBelowFloor;
        }
        if self.upper.compare_to(post) == Some(Ordering::Less) {
            return Verdict::AboveCeiling;
        }
        Verdict::Include
    }
}

impl FromStr for BoundaryRange {
    type Err = BoundaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BoundaryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lower, self.upper)
    }
}
