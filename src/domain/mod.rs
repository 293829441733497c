//! Domain types for the reading library.
//!
//! This module contains the core data structures:
//! - Entry: one archive/directory of pages and its cover selection
//! - Tag: names derived from entries
//! - Progress, User, History: per-identity state
//! - Views: response shapes for transports

pub mod entry;
pub mod progress;
pub mod tag;
pub mod user;
pub mod views;

// Re-export commonly used types
pub use entry::{CatalogEntry, ContainerKind, CropRect, EntryId, ThumbnailDescriptor};
pub use progress::Progress;
pub use tag::{Tag, TagId};
pub use user::{normalize_identity, HistoryRecord, User, UserId, DEFAULT_IDENTITY};
pub use views::{
    Chunk, EntryDetail, EntryList, EntrySummary, HistoryItem, HistoryList, ImagePayload,
    RepairOutcome, SystemStats, TagDetail, TagList, TagListItem, TagSummary, UserStats,
};
