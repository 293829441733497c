//! Persistence collaborator.
//!
//! The library core talks to storage only through [`Store`]: upsert by unique
//! name, predicate queries with limit/offset/order, counts and existence
//! checks, and lazy get-or-create of identities. [`SqliteStore`] is the
//! bundled implementation.

mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CatalogEntry, EntryId, HistoryRecord, Progress, Tag, TagId, User, UserId};
use crate::error::Result;
use crate::library::query::{EntryQuery, Pagination, TagListQuery};

pub use sqlite::SqliteStore;

/// Per-identity counters over visible rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounts {
    pub read_entries: u64,
    pub favorite_entries: u64,
    pub favorite_tags: u64,
}

/// Storage operations used by the library service
#[async_trait]
pub trait Store: Send + Sync {
    // Entries

    async fn get_entry(&self, id: EntryId) -> Result<Option<CatalogEntry>>;

    async fn get_entry_by_name(&self, name: &str) -> Result<Option<CatalogEntry>>;

    /// Insert or update by unique name, returning the row id.
    /// The creation time of an existing row is kept.
    async fn upsert_entry(&self, entry: &CatalogEntry) -> Result<EntryId>;

    /// Upsert an entry together with its tags (created as needed) as one
    /// atomic write; the entry's previous tag set is replaced.
    async fn save_entry(&self, entry: &CatalogEntry, tags: &[String]) -> Result<EntryId>;

    /// Every entry with `active = true`
    async fn list_active_entries(&self) -> Result<Vec<CatalogEntry>>;

    async fn query_entries(&self, query: &EntryQuery) -> Result<Vec<CatalogEntry>>;

    /// Rows matching `query`, ignoring its pagination
    async fn count_entries(&self, query: &EntryQuery) -> Result<u64>;

    // Tags

    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>>;

    async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Get or insert a tag by unique name
    async fn upsert_tag(&self, name: &str) -> Result<Tag>;

    /// Replace the tag set of an entry
    async fn set_entry_tags(&self, entry_id: EntryId, tag_ids: &[TagId]) -> Result<()>;

    async fn entry_tags(&self, entry_id: EntryId) -> Result<Vec<Tag>>;

    /// First visible member of a tag, by name
    async fn first_entry_of_tag(&self, tag_id: TagId) -> Result<Option<CatalogEntry>>;

    /// Number of visible members of a tag
    async fn tag_entry_count(&self, tag_id: TagId) -> Result<u64>;

    /// Visible tags with their visible member counts
    async fn query_tags(&self, query: &TagListQuery) -> Result<Vec<(Tag, u64)>>;

    async fn count_tags(&self, query: &TagListQuery) -> Result<u64>;

    // Identities

    async fn get_or_create_user(&self, email: &str) -> Result<User>;

    // Favorites

    async fn is_favorite_entry(&self, user_id: UserId, entry_id: EntryId) -> Result<bool>;

    async fn set_favorite_entry(&self, user_id: UserId, entry_id: EntryId, favorite: bool) -> Result<()>;

    async fn is_favorite_tag(&self, user_id: UserId, tag_id: TagId) -> Result<bool>;

    async fn set_favorite_tag(&self, user_id: UserId, tag_id: TagId, favorite: bool) -> Result<()>;

    /// Whether any tag of the entry is a favorite of the identity
    async fn has_favorite_tag(&self, user_id: UserId, entry_id: EntryId) -> Result<bool>;

    // Progress

    async fn get_progress(&self, user_id: UserId, entry_id: EntryId) -> Result<Option<Progress>>;

    /// Insert or replace the single record for (user, entry)
    async fn save_progress(&self, progress: &Progress) -> Result<()>;

    // History

    async fn record_view(&self, user_id: UserId, entry_id: EntryId, at: DateTime<Utc>) -> Result<()>;

    /// Views newest first
    async fn history(&self, user_id: UserId, pagination: Option<Pagination>) -> Result<Vec<HistoryRecord>>;

    async fn count_history(&self, user_id: UserId) -> Result<u64>;

    // Statistics

    async fn count_visible_entries(&self) -> Result<u64>;

    async fn count_visible_tags(&self) -> Result<u64>;

    async fn user_counts(&self, user_id: UserId) -> Result<UserCounts>;
}
