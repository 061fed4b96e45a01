//! Diff engine: local files whose key is absent from the remote index.
//!
//! Existence is the only criterion. A file whose key already exists remotely
//! is never uploaded again, whatever its content.

use super::index::RemoteKeySet;
use crate::fs::walker::LocalFile;
use crate::transfer::UploadRequest;

/// Lazily turn scanned files into upload requests for `bucket`, keeping
/// traversal order.
pub fn missing_files<'a, I>(
    index: &'a RemoteKeySet,
    bucket: &'a str,
    files: I,
) -> impl Iterator<Item = UploadRequest> + 'a
where
    I: IntoIterator<Item = LocalFile>,
    I::IntoIter: 'a,
{
    files
        .into_iter()
        .filter(move |file| !index.contains(&file.key))
        .map(move |file| UploadRequest {
            source: file.path,
            key: file.key,
            bucket: bucket.to_string(),
        })
}
