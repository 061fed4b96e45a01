//! Upload worker pool.
//!
//! A fixed number of workers pull requests from the shared queue until it is
//! closed and empty. A failed open or transfer is logged and counted; the
//! worker moves on to the next request.

use super::{UploadReceiver, UploadRequest};
use crate::storage::ObjectStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Outcome of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    OpenFailed,
    UploadFailed,
}

/// Totals across every worker of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub open_failed: usize,
    pub upload_failed: usize,
}

impl UploadSummary {
    /// Requests that were attempted, whatever the outcome
    pub fn attempted(&self) -> usize {
        self.uploaded + self.open_failed + self.upload_failed
    }
}

#[derive(Debug, Default)]
struct Counters {
    uploaded: AtomicUsize,
    open_failed: AtomicUsize,
    upload_failed: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: UploadOutcome) {
        let counter = match outcome {
            UploadOutcome::Uploaded => &self.uploaded,
            UploadOutcome::OpenFailed => &self.open_failed,
            UploadOutcome::UploadFailed => &self.upload_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> UploadSummary {
        UploadSummary {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            open_failed: self.open_failed.load(Ordering::Relaxed),
            upload_failed: self.upload_failed.load(Ordering::Relaxed),
        }
    }
}

pub struct UploadPool {
    tracker: TaskTracker,
    counters: Arc<Counters>,
    workers: usize,
}

impl UploadPool {
    /// Spawn `workers` upload workers bound to `receiver`.
    pub fn spawn(store: Arc<dyn ObjectStore>, receiver: UploadReceiver, workers: usize) -> Self {
        let receiver = Arc::new(receiver);
        let counters = Arc::new(Counters::default());
        let tracker = TaskTracker::new();

        for id in 0..workers {
            tracker.spawn(run_worker(
                id,
                store.clone(),
                receiver.clone(),
                counters.clone(),
            ));
        }
        tracker.close();

        info!(workers, "Upload workers started");

        Self {
            tracker,
            counters,
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Totals so far
    pub fn summary(&self) -> UploadSummary {
        self.counters.snapshot()
    }

    /// Wait until every worker has exited. Workers exit only once the queue
    /// has been closed and drained, so close the queue first.
    pub async fn drain(self) -> UploadSummary {
        self.tracker.wait().await;
        self.counters.snapshot()
    }
}

async fn run_worker(
    id: usize,
    store: Arc<dyn ObjectStore>,
    receiver: Arc<UploadReceiver>,
    counters: Arc<Counters>,
) {
    debug!(worker = id, "Upload worker waiting for requests");

    while let Some(request) = receiver.recv().await {
        let outcome = upload_one(store.as_ref(), &request).await;
        counters.record(outcome);
    }

    debug!(worker = id, "Upload queue closed, worker exiting");
}

/// Open the source file and transfer it. Never retries.
pub async fn upload_one(store: &dyn ObjectStore, request: &UploadRequest) -> UploadOutcome {
    let file = match File::open(&request.source).await {
        Ok(file) => file,
        Err(e) => {
            error!(
                file = %request.source.display(),
                error = %e,
                "Error opening file"
            );
            return UploadOutcome::OpenFailed;
        }
    };

    info!(file = %request.source.display(), key = %request.key, "Uploading object");

    match store.put_object(&request.bucket, &request.key, file).await {
        Ok(()) => {
            info!(
                file = %request.source.display(),
                bucket = %request.bucket,
                "Uploaded file"
            );
            UploadOutcome::Uploaded
        }
        Err(e) => {
            error!(
                file = %request.source.display(),
                bucket = %request.bucket,
                error = %e,
                "Error uploading file"
            );
            UploadOutcome::UploadFailed
        }
    }
}
