//! Remote key index: every key that exists under a prefix when a pass starts.

use crate::storage::{ObjectStore, StorageOutcome};
use std::collections::HashSet;
use thiserror::Error;

/// Keys known to exist remotely. Built fresh for every pass.
#[derive(Debug, Clone, Default)]
pub struct RemoteKeySet {
    keys: HashSet<String>,
}

impl RemoteKeySet {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<String> for RemoteKeySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("listing {bucket}/{prefix} failed: {detail}")]
    Transport {
        bucket: String,
        prefix: String,
        detail: String,
    },
}

/// List every key under `prefix`, following pagination to the end. Fails
/// without a partial result if any page cannot be fetched; never retries.
pub async fn build_remote_index(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<RemoteKeySet, IndexError> {
    let mut keys = HashSet::new();
    let mut continuation = None;
    let mut pages = 0usize;

    loop {
        match store.list_page(bucket, prefix, continuation.take()).await {
            StorageOutcome::Found(page) => {
                pages += 1;
                keys.extend(page.keys);

                match page.continuation {
                    Some(token) => continuation = Some(token),
                    None => break,
                }
            }
            StorageOutcome::NotFound => return Err(IndexError::BucketNotFound(bucket.to_string())),
            StorageOutcome::TransportError(detail) => {
                return Err(IndexError::Transport {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    detail,
                })
            }
        }
    }

    tracing::debug!(bucket, prefix, pages, keys = keys.len(), "Remote index built");
    Ok(RemoteKeySet { keys })
}
