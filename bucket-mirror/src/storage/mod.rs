//! Object-storage capability consumed by the sync engine.
//!
//! The engine only needs three calls: probe a bucket, list one page of keys
//! under a prefix, and upload one object. Calls that must tell "does not
//! exist" apart from transport failures return a [`StorageOutcome`] instead
//! of an error that callers would have to inspect.

pub mod s3;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::File;

#[cfg(test)]
use mockall::automock;

pub use s3::S3Store;

/// Result of a storage call where absence is an expected answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOutcome<T> {
    Found(T),
    NotFound,
    TransportError(String),
}

/// One page of a key listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,

    /// Token for the next page, `None` on the last page
    pub continuation: Option<String>,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read upload body: {0}")]
    Body(String),

    #[error("transfer failed: {0}")]
    Transport(String),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lightweight existence check for a bucket
    async fn probe_bucket(&self, bucket: &str) -> StorageOutcome<()>;

    /// List one page of keys under `prefix`, resuming from `continuation`
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageOutcome<KeyPage>;

    /// Upload the full contents of `body` to `bucket/key`, creating or
    /// overwriting the object
    async fn put_object(&self, bucket: &str, key: &str, body: File) -> Result<(), StorageError>;
}
