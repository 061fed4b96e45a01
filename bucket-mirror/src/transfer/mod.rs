//! Upload pipeline: a shared queue of upload requests drained by a fixed
//! pool of workers.

pub mod queue;
pub mod worker;

use std::path::PathBuf;

pub use queue::{QueueClosed, UploadQueue, UploadReceiver};
pub use worker::{UploadPool, UploadSummary};

/// One file to transfer. Consumed exactly once by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Absolute path of the local file
    pub source: PathBuf,

    /// Destination key
    pub key: String,

    /// Destination bucket
    pub bucket: String,
}
