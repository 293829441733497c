//! Long-running catalog maintenance.
//!
//! Tasks are queued on a [`MaintenanceWorker`] and run one at a time in the
//! background. Submitting returns immediately with a [`TaskId`]; the outcome
//! is observed through [`MaintenanceHandle::status`], never returned to the
//! submitter.

pub mod worker;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

pub use worker::{MaintenanceHandle, MaintenanceWorker, TaskId, TaskStatus};

/// Bulk operations over the whole catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenanceTask {
    /// Delete every cached thumbnail file
    PurgeCache,

    /// Discard each active entry's thumbnail so it is regenerated on demand
    RebuildThumbnails,

    /// Re-derive tags for every active entry
    PopulateTags,
}

impl MaintenanceTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceTask::PurgeCache => "purge-cache",
            MaintenanceTask::RebuildThumbnails => "rebuild-thumbnails",
            MaintenanceTask::PopulateTags => "populate-tags",
        }
    }
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceTask {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purge-cache" => Ok(MaintenanceTask::PurgeCache),
            "rebuild-thumbnails" => Ok(MaintenanceTask::RebuildThumbnails),
            "populate-tags" => Ok(MaintenanceTask::PopulateTags),
            _ => Err(LibraryError::invalid(format!("unknown maintenance task: {}", s))),
        }
    }
}
