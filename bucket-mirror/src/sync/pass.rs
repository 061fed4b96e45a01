//! One sync pass for one task: index the remote prefix, walk the local tree,
//! and enqueue every file missing remotely.

use super::diff::missing_files;
use super::index::{build_remote_index, IndexError};
use super::key::listing_prefix;
use crate::config::BackupTask;
use crate::fs::walker::{scan_tree, WalkOptions};
use crate::storage::ObjectStore;
use crate::transfer::UploadQueue;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Local files seen
    pub scanned: usize,
    /// Upload requests pushed onto the queue
    pub enqueued: usize,
    /// Entries skipped because of traversal errors
    pub skipped_entries: usize,
}

#[derive(Error, Debug)]
pub enum PassError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("upload queue closed after {enqueued} requests")]
    QueueClosed { enqueued: usize },

    #[error("local scan aborted: {0}")]
    Scan(String),
}

/// Run a full pass. The local walk and the diff run on the blocking pool and
/// feed the queue as they go, so a full queue slows the walk down.
///
/// Nothing is scanned if the remote index cannot be built.
pub async fn run_pass(
    store: &dyn ObjectStore,
    queue: &Arc<UploadQueue>,
    bucket: &str,
    task: &BackupTask,
    options: &WalkOptions,
) -> Result<PassSummary, PassError> {
    let prefix = listing_prefix(&task.remote_path);
    let index = build_remote_index(store, bucket, &prefix).await?;

    tracing::debug!(
        bucket,
        task = %task.name,
        remote_keys = index.len(),
        "Remote index ready, scanning local tree"
    );

    let queue = queue.clone();
    let bucket = bucket.to_string();
    let root = task.local_path.clone();
    let remote_path = task.remote_path.clone();
    let options = options.clone();

    tokio::task::spawn_blocking(move || {
        let mut scanner = scan_tree(&root, &remote_path, &options);
        let mut scanned = 0usize;
        let mut enqueued = 0usize;

        let files = scanner.by_ref().inspect(|_| scanned += 1);
        for request in missing_files(&index, &bucket, files) {
            if queue.blocking_enqueue(request).is_err() {
                return Err(PassError::QueueClosed { enqueued });
            }
            enqueued += 1;
        }

        Ok(PassSummary {
            scanned,
            enqueued,
            skipped_entries: scanner.skipped(),
        })
    })
    .await
    .map_err(|e| PassError::Scan(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use crate::transfer::{UploadPool, UploadSummary};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn task(root: &Path, remote_path: &str) -> BackupTask {
        BackupTask {
            name: "albums".to_string(),
            local_path: root.to_path_buf(),
            remote_path: remote_path.to_string(),
            schedule: "0 * * * *".to_string(),
        }
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("trip")).unwrap();
        fs::write(root.join("cover.jpg"), b"cover").unwrap();
        fs::write(root.join("trip/img.jpg"), b"img").unwrap();
        fs::write(root.join("trip/map.png"), b"map").unwrap();
    }

    /// Run one pass with its own queue and pool, wait for the uploads.
    async fn pass_and_upload(
        store: &Arc<MemoryStore>,
        task: &BackupTask,
    ) -> (PassSummary, UploadSummary) {
        let (queue, receiver) = UploadQueue::bounded(2);
        let pool = UploadPool::spawn(store.clone(), receiver, 2);

        let summary = run_pass(store.as_ref(), &queue, "photos", task, &WalkOptions::default())
            .await
            .unwrap();

        queue.close().await;
        (summary, pool.drain().await)
    }

    #[tokio::test]
    async fn test_pass_uploads_only_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let store = Arc::new(MemoryStore::new());
        store.create_bucket("photos");
        store.insert("photos", "albums/2024/cover.jpg", b"old cover");

        let (summary, uploads) = pass_and_upload(&store, &task(temp_dir.path(), "albums/2024")).await;

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.enqueued, 2);
        assert_eq!(uploads.uploaded, 2);
        assert_eq!(store.object("photos", "albums/2024/trip/img.jpg").unwrap(), b"img");
        // Existence only: the differing remote copy is left alone.
        assert_eq!(store.object("photos", "albums/2024/cover.jpg").unwrap(), b"old cover");
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let store = Arc::new(MemoryStore::new().with_page_size(1));
        store.create_bucket("photos");
        let task = task(temp_dir.path(), "albums/2024");

        let (first, _) = pass_and_upload(&store, &task).await;
        let (second, uploads) = pass_and_upload(&store, &task).await;

        assert_eq!(first.enqueued, 3);
        assert_eq!(second.scanned, 3);
        assert_eq!(second.enqueued, 0);
        assert_eq!(uploads.attempted(), 0);
    }

    #[tokio::test]
    async fn test_new_local_file_is_picked_up_next_pass() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let store = Arc::new(MemoryStore::new());
        store.create_bucket("photos");
        let task = task(temp_dir.path(), "");

        pass_and_upload(&store, &task).await;
        fs::write(temp_dir.path().join("trip/late.jpg"), b"late").unwrap();
        let (summary, _) = pass_and_upload(&store, &task).await;

        assert_eq!(summary.enqueued, 1);
        assert_eq!(
            store.keys("photos"),
            vec!["cover.jpg", "trip/img.jpg", "trip/late.jpg", "trip/map.png"]
        );
    }

    #[tokio::test]
    async fn test_missing_bucket_aborts_before_scanning() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let store = MemoryStore::new();
        let (queue, _receiver) = UploadQueue::bounded(8);

        let err = run_pass(&store, &queue, "photos", &task(temp_dir.path(), ""), &WalkOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PassError::Index(IndexError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_pass() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let store = MemoryStore::new();
        store.create_bucket("photos");
        store.break_bucket("photos");
        let (queue, _receiver) = UploadQueue::bounded(8);

        let err = run_pass(&store, &queue, "photos", &task(temp_dir.path(), ""), &WalkOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PassError::Index(IndexError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_closed_queue_stops_enqueueing() {
        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());

        let store = MemoryStore::new();
        store.create_bucket("photos");
        let (queue, _receiver) = UploadQueue::bounded(8);
        queue.close().await;

        let err = run_pass(&store, &queue, "photos", &task(temp_dir.path(), ""), &WalkOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PassError::QueueClosed { enqueued: 0 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fifo_in_tree_does_not_stall_drain() {
        use nix::sys::stat::Mode;
        use std::time::Duration;

        let temp_dir = TempDir::new().unwrap();
        populate(temp_dir.path());
        nix::unistd::mkfifo(temp_dir.path().join("trip/pipe").as_path(), Mode::S_IRUSR | Mode::S_IWUSR)
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        store.create_bucket("photos");

        let (summary, uploads) = tokio::time::timeout(
            Duration::from_secs(10),
            pass_and_upload(&store, &task(temp_dir.path(), "albums/2024")),
        )
        .await
        .expect("upload drain stalled");

        assert_eq!(summary.scanned, 3);
        assert_eq!(uploads.uploaded, 3);
        assert!(store.object("photos", "albums/2024/trip/pipe").is_none());
    }
}
