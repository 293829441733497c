//! Identities that own favorites, progress and history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::EntryId;

/// Primary key of a user
pub type UserId = i64;

/// Identity used when the caller does not name one
pub const DEFAULT_IDENTITY: &str = "default@example.com";

/// A lazily created identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

/// Map an empty identity onto the default one
pub fn normalize_identity(identity: &str) -> &str {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        DEFAULT_IDENTITY
    } else {
        trimmed
    }
}

/// One "entry viewed" event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub user_id: UserId,
    pub entry_id: EntryId,
    pub viewed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity(""), DEFAULT_IDENTITY);
        assert_eq!(normalize_identity("   "), DEFAULT_IDENTITY);
        assert_eq!(normalize_identity("reader@example.com"), "reader@example.com");
    }
}
