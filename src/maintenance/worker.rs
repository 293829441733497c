//! Background task queue with observable status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::MaintenanceTask;
use crate::error::{LibraryError, Result};
use crate::library::LibraryService;

/// Identifier handed out on submission
pub type TaskId = Uuid;

/// Queue capacity before `submit` waits
const QUEUE_CAPACITY: usize = 64;

/// Poll interval of [`MaintenanceHandle::wait`]
const WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of a submitted task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued, not started
    Pending,

    Running,

    /// Finished; `processed` counts entries (or files) handled
    Completed { processed: usize },

    /// Aborted with an error; the message is also logged
    Failed(String),

    /// Stopped by shutdown before or while running
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed { .. } | TaskStatus::Failed(_) | TaskStatus::Cancelled
        )
    }
}

type StatusMap = Arc<Mutex<HashMap<TaskId, TaskStatus>>>;

fn lock(statuses: &StatusMap) -> MutexGuard<'_, HashMap<TaskId, TaskStatus>> {
    statuses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_status(statuses: &StatusMap, id: TaskId, status: TaskStatus) {
    lock(statuses).insert(id, status);
}

#[derive(Debug)]
struct Job {
    id: TaskId,
    task: MaintenanceTask,
}

enum Outcome {
    Completed(usize),
    Cancelled,
}

/// Spawns the background worker
pub struct MaintenanceWorker;

impl MaintenanceWorker {
    /// Start a worker on the current tokio runtime
    pub fn spawn(service: Arc<LibraryService>) -> MaintenanceHandle {
        let (job_tx, job_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let statuses: StatusMap = Arc::new(Mutex::new(HashMap::new()));

        let task = tokio::spawn(run_worker(
            service,
            job_rx,
            cancel_rx,
            Arc::clone(&statuses),
        ));

        MaintenanceHandle {
            job_tx,
            cancel_tx,
            statuses,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Owner of a running worker.
///
/// A status stays observable until [`wait`](Self::wait) has returned it as
/// terminal; after that the id is forgotten.
pub struct MaintenanceHandle {
    job_tx: mpsc::Sender<Job>,
    cancel_tx: watch::Sender<bool>,
    statuses: StatusMap,

    /// Taken by the first shutdown
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceHandle {
    /// Queue a task; returns as soon as it is accepted
    pub async fn submit(&self, task: MaintenanceTask) -> Result<TaskId> {
        let id = Uuid::new_v4();
        set_status(&self.statuses, id, TaskStatus::Pending);

        if self.job_tx.send(Job { id, task }).await.is_err() {
            lock(&self.statuses).remove(&id);
            return Err(LibraryError::WorkerStopped);
        }

        info!(%id, %task, "Maintenance task queued");
        Ok(id)
    }

    /// Current status, or `None` for an unknown id
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        lock(&self.statuses).get(&id).cloned()
    }

    /// Wait until the task reaches a terminal status and evict it
    pub async fn wait(&self, id: TaskId) -> Option<TaskStatus> {
        loop {
            {
                let mut statuses = lock(&self.statuses);
                match statuses.get(&id) {
                    Some(status) if status.is_terminal() => return statuses.remove(&id),
                    Some(_) => {}
                    None => return None,
                }
            }
            tokio::time::sleep(WAIT_INTERVAL).await;
        }
    }

    /// Cancel running and queued work and wait for the worker to exit.
    ///
    /// Statuses stay readable afterwards; later submissions fail with
    /// [`LibraryError::WorkerStopped`].
    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.cancel_tx.send(true);

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.await?;
        }
        Ok(())
    }
}

async fn run_worker(
    service: Arc<LibraryService>,
    mut jobs: mpsc::Receiver<Job>,
    mut cancel: watch::Receiver<bool>,
    statuses: StatusMap,
) {
    info!("Maintenance worker started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            job = jobs.recv() => match job {
                Some(job) => run_job(&service, job, &cancel, &statuses).await,
                None => break,
            },
        }
    }

    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        set_status(&statuses, job.id, TaskStatus::Cancelled);
    }

    info!("Maintenance worker stopped");
}

async fn run_job(
    service: &LibraryService,
    job: Job,
    cancel: &watch::Receiver<bool>,
    statuses: &StatusMap,
) {
    if *cancel.borrow() {
        set_status(statuses, job.id, TaskStatus::Cancelled);
        return;
    }

    set_status(statuses, job.id, TaskStatus::Running);
    info!(id = %job.id, task = %job.task, "Maintenance task started");

    let status = match execute(service, job.task, cancel).await {
        Ok(Outcome::Completed(processed)) => {
            info!(id = %job.id, task = %job.task, processed, "Maintenance task completed");
            TaskStatus::Completed { processed }
        }
        Ok(Outcome::Cancelled) => {
            warn!(id = %job.id, task = %job.task, "Maintenance task cancelled");
            TaskStatus::Cancelled
        }
        Err(e) => {
            error!(id = %job.id, task = %job.task, "Maintenance task failed: {}", e);
            TaskStatus::Failed(e.to_string())
        }
    };

    set_status(statuses, job.id, status);
}

async fn execute(
    service: &LibraryService,
    task: MaintenanceTask,
    cancel: &watch::Receiver<bool>,
) -> Result<Outcome> {
    match task {
        MaintenanceTask::PurgeCache => Ok(Outcome::Completed(service.purge_cache().await?)),

        MaintenanceTask::RebuildThumbnails => {
            let mut processed = 0;
            for entry in service.active_entries().await? {
                if *cancel.borrow() {
                    return Ok(Outcome::Cancelled);
                }
                service.discard_thumbnail(entry.id);
                processed += 1;
            }
            Ok(Outcome::Completed(processed))
        }

        MaintenanceTask::PopulateTags => {
            let mut processed = 0;
            for entry in service.active_entries().await? {
                if *cancel.borrow() {
                    return Ok(Outcome::Cancelled);
                }
                match service.refresh_tags(&entry).await {
                    Ok(tags) => {
                        info!(name = %entry.name, tags = tags.len(), "Populated tags");
                        processed += 1;
                    }
                    Err(e) => warn!(name = %entry.name, "Failed to populate tags: {}", e),
                }
            }
            Ok(Outcome::Completed(processed))
        }
    }
}
