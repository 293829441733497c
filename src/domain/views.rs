//! Response shapes handed to transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::EntryId;
use super::tag::TagId;
use super::user::UserId;

/// One row of a catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub id: EntryId,
    pub name: String,
    pub is_favorite: bool,

    /// A progress record exists for this identity
    pub is_read: bool,
    pub page_count: usize,
    pub current_page: usize,
    pub max_progress: usize,

    /// At least one of the entry's tags is a favorite of this identity
    pub has_favorite_tag: bool,
}

/// A page of catalog results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryList {
    pub items: Vec<EntrySummary>,

    /// Page actually served (reset to 0 when out of range)
    pub page: i64,
    pub total_pages: i64,

    /// Favorite flag of the root tag, for tag-rooted listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_favorite: Option<bool>,
}

/// A tag as seen from one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub id: TagId,
    pub name: String,
    pub is_favorite: bool,
    pub is_hidden: bool,
}

/// Full record of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetail {
    pub id: EntryId,
    pub name: String,
    pub favorite: bool,
    pub tags: Vec<TagSummary>,
    pub page_count: usize,
    pub current_page: usize,
    pub max_progress: usize,
}

/// One row of a tag listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagListItem {
    pub id: TagId,
    pub name: String,
    pub is_favorite: bool,
    pub entry_count: u64,
}

/// A page of tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    pub items: Vec<TagListItem>,
    pub page: i64,
    pub total_pages: i64,
}

/// Full record of one tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDetail {
    pub id: TagId,
    pub name: String,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub entry_count: u64,
}

/// One row of the viewing history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub entry_id: EntryId,
    pub name: String,
    pub is_favorite: bool,
    pub has_favorite_tag: bool,
    pub page_count: usize,
    pub viewed_at: DateTime<Utc>,
}

/// A page of viewing history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryList {
    pub items: Vec<HistoryItem>,
    pub page: i64,
    pub total_pages: i64,
}

/// A complete binary payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub filename: String,

    /// Empty when the type could not be inferred
    pub content_type: String,
    pub data: Vec<u8>,
}

/// One frame of a chunked transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,

    /// Always equal to `data.len()`
    pub size: usize,
}

/// Result of re-deriving an entry from its container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub id: EntryId,
    pub name: String,
    pub page_count: usize,
    pub tags: Vec<String>,
}

/// Per-identity counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub read_entry_count: u64,
    pub favorite_entry_count: u64,
    pub favorite_tag_count: u64,
}

/// Library-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub version: String,
    pub entry_count: u64,
    pub tag_count: u64,
}
