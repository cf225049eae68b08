//! User domain entities

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A record that can be accumulated by a cursor feed
pub trait FeedRecord: Clone + Send + Sync + 'static {
    /// Identity key; the last loaded record's key becomes the next cursor
    fn record_id(&self) -> i64;
}

/// One row of `GET /user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub age: Option<i32>,
}

impl FeedRecord for UserRecord {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// A loaded record together with its position in the feed
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord<T> {
    pub position: usize,
    pub record: T,
}

/// Server-side paging strategy for the user list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PagingType {
    #[default]
    CacheCursor,
    Cursor,
    Offset,
}

impl PagingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheCursor => "cache-cursor",
            Self::Cursor => "cursor",
            Self::Offset => "offset",
        }
    }

    /// Whether pages are addressed by the last seen id rather than a page index
    pub fn uses_cursor(&self) -> bool {
        !matches!(self, Self::Offset)
    }
}

impl std::fmt::Display for PagingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown paging type: {0}")]
pub struct UnknownPagingType(pub String);

impl std::str::FromStr for PagingType {
    type Err = UnknownPagingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache-cursor" => Ok(Self::CacheCursor),
            "cursor" => Ok(Self::Cursor),
            "offset" => Ok(Self::Offset),
            other => Err(UnknownPagingType(other.to_string())),
        }
    }
}
