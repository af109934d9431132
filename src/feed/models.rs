//! Serde models for the mobile feed API.
//!
//! Only the fields the downloader reads are modeled. Posts are kept as raw
//! JSON on the card and decoded one at a time, so a single odd post cannot
//! spoil a whole page.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use super::date::parse_created_at;
use crate::boundary::PostKey;
use crate::resource::deserialize_id;

/// Video stream keys, best quality first.
const STREAM_PRIORITY: [&str; 4] = ["mp4_720p_mp4", "mp4_hd_url", "mp4_sd_url", "stream_url"];

/// One `getIndex` feed page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    /// `1` on success, `0` when the feed has nothing more to give.
    #[serde(default)]
    pub ok: i64,
    #[serde(default)]
    pub data: Option<FeedData>,
}

impl FeedPage {
    /// Whether the API flagged this page as successful.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok == 1
    }

    /// Total post count the API declares, when present.
    #[must_use]
    pub fn declared_total(&self) -> Option<u64> {
        self.data
            .as_ref()
            .and_then(|data| data.cardlist_info.as_ref())
            .and_then(|info| info.total)
    }

    /// The page's cards, empty when the page has no data.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        self.data.as_ref().map_or(&[], |data| data.cards.as_slice())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedData {
    #[serde(default, rename = "cardlistInfo")]
    pub cardlist_info: Option<CardlistInfo>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardlistInfo {
    #[serde(default)]
    pub total: Option<u64>,
}

/// A feed card. Only cards carrying an `mblog` are posts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Card {
    /// Post permalink.
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub mblog: Option<serde_json::Value>,
}

/// A post as the feed returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct Mblog {
    #[serde(deserialize_with = "deserialize_id")]
    pub mid: i64,
    pub bid: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default, rename = "isTop", deserialize_with = "deserialize_flag")]
    pub is_top: bool,
    /// Declared photo count, which may exceed the inline `pics` list.
    #[serde(default)]
    pub pic_num: u32,
    #[serde(default)]
    pub pics: Option<Vec<Pic>>,
    #[serde(default)]
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Mblog {
    /// Pinned posts sit on top of the feed out of order.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.is_top
    }

    /// Inline pictures, empty when the post has none.
    #[must_use]
    pub fn inline_pics(&self) -> &[Pic] {
        self.pics.as_deref().unwrap_or_default()
    }

    /// The best non-empty video stream address.
    #[must_use]
    pub fn video_stream(&self) -> Option<&str> {
        self.page_info
            .as_ref()
            .and_then(|info| info.media_info.as_ref())
            .and_then(MediaInfo::best_stream)
    }
}

/// A picture entry, inline in the feed or from a post page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pic {
    #[serde(default)]
    pub large: Option<PicVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PicVariant {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub media_info: Option<MediaInfo>,
}

/// Video stream addresses keyed by quality.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MediaInfo(serde_json::Map<String, serde_json::Value>);

impl MediaInfo {
    /// First non-empty stream in quality order.
    #[must_use]
    pub fn best_stream(&self) -> Option<&str> {
        STREAM_PRIORITY.iter().find_map(|key| {
            self.0
                .get(*key)
                .and_then(serde_json::Value::as_str)
                .filter(|url| !url.is_empty())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_string_id")]
    pub id: String,
    #[serde(default)]
    pub screen_name: Option<String>,
}

/// A decoded post with the context the extractor needs.
#[derive(Debug, Clone)]
pub struct Post {
    pub mblog: Mblog,
    pub permalink: String,
    /// Publication date derived from `created_at`.
    pub date: Option<NaiveDate>,
}

impl Post {
    /// Decodes a card's post, resolving relative dates against `now`.
    ///
    /// Returns `None` for cards without a post.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the post object lacks required fields.
    pub fn from_card(card: &Card, now: NaiveDateTime) -> Result<Option<Self>, serde_json::Error> {
        let Some(raw) = &card.mblog else {
            return Ok(None);
        };
        let mblog = Mblog::deserialize(raw)?;
        let date = parse_created_at(&mblog.created_at, now);
        Ok(Some(Self {
            mblog,
            permalink: card.scheme.clone(),
            date,
        }))
    }

    /// Comparison key against a boundary.
    #[must_use]
    pub fn key(&self) -> PostKey {
        PostKey::new(self.mblog.mid, self.date)
    }

    /// Caption, preferring the plain-text form.
    #[must_use]
    pub fn caption(&self) -> &str {
        self.mblog.raw_text.as_deref().unwrap_or(&self.mblog.text)
    }

    /// Whether the post was written by `uid`.
    #[must_use]
    pub fn is_by(&self, uid: &str) -> bool {
        self.mblog.user.as_ref().is_some_and(|user| user.id == uid)
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Bool(bool),
        Number(i64),
        Null(()),
    }

    Ok(match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(flag) => flag,
        RawFlag::Number(value) => value != 0,
        RawFlag::Null(()) => false,
    })
}

fn deserialize_string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(value) => value.to_string(),
        RawId::Text(text) => text,
    })
}
