//! Per-identity reading progress.

use serde::{Deserialize, Serialize};

use super::entry::EntryId;
use super::user::UserId;

/// Reading position of one identity in one entry.
///
/// At most one record exists per (user, entry) and `max >= page` holds after
/// every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub user_id: UserId,
    pub entry_id: EntryId,

    /// Page most recently opened
    pub page: usize,

    /// Furthest page ever opened
    pub max: usize,
}

impl Progress {
    /// First record for a (user, entry) pair
    pub fn start(user_id: UserId, entry_id: EntryId, page: usize) -> Self {
        Self {
            user_id,
            entry_id,
            page,
            max: page,
        }
    }

    /// Move to `page`, keeping the high-water mark
    pub fn advance(&mut self, page: usize) {
        self.page = page;
        self.max = self.max.max(page);
    }
}
