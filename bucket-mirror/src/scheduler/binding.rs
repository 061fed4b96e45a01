//! Binds backup tasks to cron firings.
//!
//! Each bucket is probed once before any of its tasks is registered. A task
//! whose schedule is rejected stays unregistered for the life of the
//! process. Every firing runs one sync pass for its task, start to finish,
//! inside the firing.

use super::{CronScheduler, JobFn, RegisterError};
use crate::config::{BackupTask, Bucket, OverlapPolicy};
use crate::fs::walker::WalkOptions;
use crate::storage::{ObjectStore, StorageOutcome};
use crate::sync::{run_pass, IndexError, PassError};
use crate::transfer::UploadQueue;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Identifies a task within its bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub bucket: String,
    pub task: String,
}

impl TaskRef {
    fn new(bucket: &str, task: &BackupTask) -> Self {
        Self {
            bucket: bucket.to_string(),
            task: task.name.clone(),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.task)
    }
}

/// Outcome of registering every configured task
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    pub registered: Vec<TaskRef>,
    /// Tasks whose schedule could not be registered
    pub unregistered: Vec<TaskRef>,
    /// Buckets missing remotely or whose probe failed
    pub skipped_buckets: Vec<String>,
}

pub struct TaskBinding {
    store: Arc<dyn ObjectStore>,
    queue: Arc<UploadQueue>,
    scheduler: Arc<dyn CronScheduler>,
    overlap: OverlapPolicy,
    walk: WalkOptions,
}

impl TaskBinding {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        queue: Arc<UploadQueue>,
        scheduler: Arc<dyn CronScheduler>,
        overlap: OverlapPolicy,
        walk: WalkOptions,
    ) -> Self {
        Self {
            store,
            queue,
            scheduler,
            overlap,
            walk,
        }
    }

    /// Register a job for every task of every reachable bucket.
    pub async fn schedule_all(&self, buckets: &[Bucket]) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        info!("Scheduling bucket tasks");

        for bucket in buckets {
            match self.store.probe_bucket(&bucket.name).await {
                StorageOutcome::Found(()) => {}
                StorageOutcome::NotFound => {
                    warn!(bucket = %bucket.name, "Bucket doesn't exist in remote, not scheduling its tasks");
                    report.skipped_buckets.push(bucket.name.clone());
                    continue;
                }
                StorageOutcome::TransportError(detail) => {
                    warn!(
                        bucket = %bucket.name,
                        error = %detail,
                        "Error occurred probing bucket, not scheduling its tasks"
                    );
                    report.skipped_buckets.push(bucket.name.clone());
                    continue;
                }
            }

            info!(bucket = %bucket.name, "Scheduling tasks for bucket");
            for task in &bucket.tasks {
                self.schedule_task(&bucket.name, task, &mut report).await;
            }
        }

        info!(
            registered = report.registered.len(),
            unregistered = report.unregistered.len(),
            skipped_buckets = report.skipped_buckets.len(),
            "Bucket tasks scheduled"
        );

        report
    }

    async fn schedule_task(&self, bucket: &str, task: &BackupTask, report: &mut ScheduleReport) {
        let task_ref = TaskRef::new(bucket, task);

        match self.scheduler.register(&task.schedule, self.firing_job(bucket, task)).await {
            Ok(job_id) => {
                info!(
                    bucket,
                    task = %task.name,
                    local = %task.local_path.display(),
                    remote = %task.remote_path,
                    cron = %task.schedule,
                    %job_id,
                    "Task scheduled"
                );
                report.registered.push(task_ref);
            }
            Err(RegisterError::InvalidExpression(expression)) => {
                warn!(
                    bucket,
                    task = %task.name,
                    local = %task.local_path.display(),
                    remote = %task.remote_path,
                    cron = %expression,
                    "Invalid cron job definition, task will not run"
                );
                report.unregistered.push(task_ref);
            }
            Err(e) => {
                warn!(bucket, task = %task.name, error = %e, "Failed to schedule task");
                report.unregistered.push(task_ref);
            }
        }
    }

    /// Callback for one task. All firings of the task share one runner so
    /// the overlap policy can see passes still in flight.
    pub fn firing_job(&self, bucket: &str, task: &BackupTask) -> JobFn {
        let runner = Arc::new(TaskRunner {
            store: self.store.clone(),
            queue: self.queue.clone(),
            bucket: bucket.to_string(),
            task: task.clone(),
            walk: self.walk.clone(),
            overlap: self.overlap,
            running: Mutex::new(()),
        });

        Arc::new(move || -> BoxFuture<'static, ()> {
            let runner = runner.clone();
            Box::pin(async move { runner.fire().await })
        })
    }
}

struct TaskRunner {
    store: Arc<dyn ObjectStore>,
    queue: Arc<UploadQueue>,
    bucket: String,
    task: BackupTask,
    walk: WalkOptions,
    overlap: OverlapPolicy,
    running: Mutex<()>,
}

impl TaskRunner {
    async fn fire(&self) {
        let _guard = match self.overlap {
            OverlapPolicy::Skip => match self.running.try_lock() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    warn!(
                        bucket = %self.bucket,
                        task = %self.task.name,
                        "Skipping scheduled run: previous pass still running"
                    );
                    return;
                }
            },
            OverlapPolicy::Queue => Some(self.running.lock().await),
            OverlapPolicy::Allow => None,
        };

        info!(bucket = %self.bucket, task = %self.task.name, "Starting sync pass");

        match run_pass(self.store.as_ref(), &self.queue, &self.bucket, &self.task, &self.walk).await {
            Ok(summary) => info!(
                bucket = %self.bucket,
                task = %self.task.name,
                scanned = summary.scanned,
                enqueued = summary.enqueued,
                skipped_entries = summary.skipped_entries,
                "Sync pass finished"
            ),
            Err(PassError::Index(IndexError::BucketNotFound(_))) => info!(
                bucket = %self.bucket,
                task = %self.task.name,
                "Bucket no longer exists in remote, skipping pass"
            ),
            Err(PassError::QueueClosed { enqueued }) => warn!(
                bucket = %self.bucket,
                task = %self.task.name,
                enqueued,
                "Upload queue closed during pass, remaining files left for a later run"
            ),
            Err(e) => error!(
                bucket = %self.bucket,
                task = %self.task.name,
                error = %e,
                "Sync pass failed"
            ),
        }
    }
}
