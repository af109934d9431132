//! Downloadable media records and the dumped resource list.
//!
//! A [`Resource`] is produced by the feed extractor, never mutated, and
//! consumed by the naming template and the download scheduler. A run can
//! write its resources to a JSON file ([`write_dump`]) and a later run can
//! download from that file ([`load_dump`]) without paginating the feed.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};


/// Media type of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A large-size picture.
    Photo,
    /// A video stream.
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => f.write_str("photo"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// One downloadable item.
///
/// Within one run `(mid, kind, index)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Owner account identifier.
    pub uid: String,
    /// Numeric post identifier, larger is newer.
    #[serde(deserialize_with = "deserialize_id")]
    pub mid: i64,
    /// Short post identifier.
    pub bid: String,
    /// Post publication date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Raw post caption.
    #[serde(default)]
    pub text: String,
    /// Media address.
    pub url: String,
    /// 1-based position inside the post. Absent for videos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Photo or video. Older dumps name this field `type`.
    #[serde(alias = "type")]
    pub kind: MediaKind,
}

/// Accepts a post identifier written either as a JSON number or a string.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(value) => Ok(value),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Errors reading or writing a dumped resource list.
#[derive(Debug, Error)]
pub enum DumpError {
    /// File could not be read or written.
    #[error("IO error on resource dump {path}: {source}")]
    Io {
        /// Dump file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File content is not a JSON array of resources.
    #[error("invalid resource dump {path}: {source}")]
    Json {
        /// Dump file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a dumped resource list.
///
/// # Errors
///
/// Returns [`DumpError`] when the file cannot be read or parsed.
#[instrument(fields(path = %path.display()))]
pub async fn load_dump(path: &Path) -> Result<Vec<Resource>, DumpError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DumpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let resources: Vec<Resource> =
        serde_json::from_str(&content).map_err(|source| DumpError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(count = resources.len(), "loaded resource dump");
    Ok(resources)
}

/// Writes a resource list as pretty-printed JSON, replacing any existing file.
///
/// # Errors
///
/// Returns [`DumpError`] when serialization or the write fails.
#[instrument(skip(resources), fields(path = %path.display(), count = resources.len()))]
pub async fn write_dump(path: &Path, resources: &[Resource]) -> Result<(), DumpError> {
    let json = serde_json::to_string_pretty(resources).map_err(|source| DumpError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| DumpError::Io {
            path: path.to_path_buf(),
            source,
        })
}
