//! Lifecycle controller.
//!
//! Startup order is fixed: upload workers, then task registration, then the
//! scheduler clock. On shutdown the upload queue is closed, every worker is
//! awaited until the queue is drained, and only then is the scheduler
//! stopped.

use crate::config::Config;
use crate::fs::walker::WalkOptions;
use crate::scheduler::{CronScheduler, ScheduleReport, TaskBinding};
use crate::storage::ObjectStore;
use crate::transfer::{UploadPool, UploadQueue, UploadSummary};
use crate::utils::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// What happened between startup and shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub schedule: ScheduleReport,
    pub uploads: UploadSummary,
}

pub struct Mirror {
    config: Config,
    store: Arc<dyn ObjectStore>,
    scheduler: Arc<dyn CronScheduler>,
}

impl Mirror {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, scheduler: Arc<dyn CronScheduler>) -> Self {
        Self {
            config,
            store,
            scheduler,
        }
    }

    /// Run until `shutdown` resolves, then drain and stop.
    pub async fn run<F>(self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let workers = self.config.effective_concurrency();
        let (queue, receiver) = UploadQueue::bounded(self.config.effective_queue_capacity());

        info!("Starting upload handlers");
        let pool = UploadPool::spawn(self.store.clone(), receiver, workers);

        let binding = TaskBinding::new(
            self.store.clone(),
            queue.clone(),
            self.scheduler.clone(),
            self.config.scheduler.overlap,
            WalkOptions {
                follow_links: self.config.scan.follow_links,
            },
        );
        let schedule = binding.schedule_all(&self.config.buckets).await;

        if schedule.registered.is_empty() {
            warn!("No tasks registered, nothing will be mirrored");
        }

        if let Err(e) = self.scheduler.start().await {
            queue.close().await;
            pool.drain().await;
            return Err(e);
        }
        info!("Scheduler started");

        shutdown.await;

        info!("Closing upload queue");
        queue.close().await;

        let uploads = pool.drain().await;
        info!(
            uploaded = uploads.uploaded,
            open_failed = uploads.open_failed,
            upload_failed = uploads.upload_failed,
            "Upload workers drained"
        );

        if let Err(e) = self.scheduler.stop().await {
            warn!("Scheduler shutdown error: {}", e);
        }

        Ok(RunReport { schedule, uploads })
    }
}
