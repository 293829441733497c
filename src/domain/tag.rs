//! Tags derived from entry names.

use serde::{Deserialize, Serialize};

/// Primary key of a tag
pub type TagId = i64;

/// A tag shared by any number of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,

    /// Unique, exact-match name
    pub name: String,

    /// Hidden tags are not counted in statistics
    pub hidden: bool,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            hidden: false,
        }
    }
}
