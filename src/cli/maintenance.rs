//! Maintenance subcommands.
//!
//! Each command starts a background worker, queues one task, waits for it to
//! finish and shuts the worker down again.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Subcommand;

use crate::library::LibraryService;
use crate::maintenance::{MaintenanceTask, MaintenanceWorker, TaskStatus};

/// Maintenance-related subcommands
#[derive(Subcommand, Debug)]
pub enum MaintenanceCommands {
    /// Delete every cached thumbnail
    PurgeCache,

    /// Drop each entry's thumbnail so it is regenerated on next request
    RebuildThumbnails,

    /// Re-derive tags for every active entry
    PopulateTags,
}

impl From<&MaintenanceCommands> for MaintenanceTask {
    fn from(command: &MaintenanceCommands) -> Self {
        match command {
            MaintenanceCommands::PurgeCache => MaintenanceTask::PurgeCache,
            MaintenanceCommands::RebuildThumbnails => MaintenanceTask::RebuildThumbnails,
            MaintenanceCommands::PopulateTags => MaintenanceTask::PopulateTags,
        }
    }
}

/// Run one maintenance task to completion
pub async fn execute(service: LibraryService, command: MaintenanceCommands) -> Result<()> {
    let task = MaintenanceTask::from(&command);
    let handle = MaintenanceWorker::spawn(Arc::new(service));

    let id = handle.submit(task).await?;
    println!("Queued {} ({})", task, id);

    let status = handle.wait(id).await;
    handle.shutdown().await?;

    match status {
        Some(TaskStatus::Completed { processed }) => {
            println!("{} finished: {} processed", task, processed);
            Ok(())
        }
        Some(TaskStatus::Failed(message)) => bail!("{} failed: {}", task, message),
        Some(TaskStatus::Cancelled) => bail!("{} was cancelled", task),
        Some(other) => bail!("{} ended in unexpected state {:?}", task, other),
        None => bail!("{} vanished from the worker", task),
    }
}
