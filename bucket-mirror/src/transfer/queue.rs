//! Shared upload queue.
//!
//! The only sender lives inside [`UploadQueue`] and is never handed out, so
//! [`UploadQueue::close`] drops the last sender and the channel closes for
//! good. Every enqueue after that fails with [`QueueClosed`]; workers keep
//! receiving until the buffered requests are drained.

use super::UploadRequest;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};

#[derive(Error, Debug)]
#[error("upload queue is closed")]
pub struct QueueClosed(pub UploadRequest);

pub struct UploadQueue {
    sender: RwLock<Option<mpsc::Sender<UploadRequest>>>,
}

/// Receiving half, shared by every worker of the pool
pub struct UploadReceiver {
    receiver: Mutex<mpsc::Receiver<UploadRequest>>,
}

impl UploadQueue {
    /// Create a bounded queue. A full queue makes enqueuers wait.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn bounded(capacity: usize) -> (Arc<Self>, UploadReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Arc::new(Self {
                sender: RwLock::new(Some(tx)),
            }),
            UploadReceiver {
                receiver: Mutex::new(rx),
            },
        )
    }

    pub async fn enqueue(&self, request: UploadRequest) -> Result<(), QueueClosed> {
        let guard = self.sender.read().await;
        match guard.as_ref() {
            Some(tx) => tx.send(request).await.map_err(|e| QueueClosed(e.0)),
            None => Err(QueueClosed(request)),
        }
    }

    /// Enqueue from a blocking thread (e.g. inside `spawn_blocking`).
    ///
    /// Must not be called from an async context.
    pub fn blocking_enqueue(&self, request: UploadRequest) -> Result<(), QueueClosed> {
        let guard = self.sender.blocking_read();
        match guard.as_ref() {
            Some(tx) => tx.blocking_send(request).map_err(|e| QueueClosed(e.0)),
            None => Err(QueueClosed(request)),
        }
    }

    /// Close the queue. Waits for enqueues already in progress, then drops the
    /// sender. Returns `false` if the queue was already closed.
    pub async fn close(&self) -> bool {
        let mut guard = self.sender.write().await;
        guard.take().is_some()
    }

    pub async fn is_closed(&self) -> bool {
        self.sender.read().await.is_none()
    }
}

impl UploadReceiver {
    /// Wait for the next request. Returns `None` once the queue is closed and
    /// empty.
    pub async fn recv(&self) -> Option<UploadRequest> {
        self.receiver.lock().await.recv().await
    }
}
