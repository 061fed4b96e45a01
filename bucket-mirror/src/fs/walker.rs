//! Local tree scanner.
//!
//! Walks a task's local directory lazily and yields every regular file
//! together with the object key it maps to. FIFOs, sockets and device nodes
//! are never yielded. Without `follow_links`, a symlink is yielded only when
//! it resolves to a regular file.

use crate::sync::key::object_key;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,
}

/// A file discovered during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute path to the file
    pub path: PathBuf,

    /// Destination key under the task's remote prefix
    pub key: String,
}

/// Lazy iterator over the files beneath a root.
///
/// Entries that cannot be read (permission denied, vanished while walking)
/// are logged and skipped; the walk carries on with the rest of the tree.
pub struct TreeScanner {
    entries: walkdir::IntoIter,
    root: PathBuf,
    /// Directory keys are computed against; the parent when `root` is a file
    base: PathBuf,
    remote_path: String,
    skipped: usize,
}

impl TreeScanner {
    /// Number of entries skipped because of traversal errors so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for TreeScanner {
    type Item = LocalFile;

    fn next(&mut self) -> Option<LocalFile> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(
                        root = %self.root.display(),
                        path = ?e.path(),
                        error = %e,
                        "Skipping unreadable entry"
                    );
                    continue;
                }
            };

            if !is_regular_file(&entry) {
                continue;
            }

            let path = entry.into_path();
            let key = match path.strip_prefix(&self.base) {
                Ok(relative) => object_key(&self.remote_path, relative),
                Err(_) => {
                    self.skipped += 1;
                    tracing::warn!(path = %path.display(), "Entry outside of walk root, skipping");
                    continue;
                }
            };

            return Some(LocalFile { path, key });
        }
    }
}

/// Start a lazy walk of `root`, computing keys under `remote_path`.
///
/// # Example
/// ```no_run
/// use bucket_mirror::fs::walker::{scan_tree, WalkOptions};
/// use std::path::Path;
///
/// for file in scan_tree(Path::new("/data/photos"), "albums/2024", &WalkOptions::default()) {
///     println!("{} -> {}", file.path.display(), file.key);
/// }
/// ```
pub fn scan_tree(root: &Path, remote_path: &str, options: &WalkOptions) -> TreeScanner {
    let root = absolute_root(root);

    // A single-file root maps to `remote_path/<file name>`
    let base = match root.parent() {
        Some(parent) if root.is_file() => parent.to_path_buf(),
        _ => root.clone(),
    };

    TreeScanner {
        entries: WalkDir::new(&root).follow_links(options.follow_links).into_iter(),
        root,
        base,
        remote_path: remote_path.to_string(),
        skipped: 0,
    }
}

fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        // Directories, FIFOs, sockets, device nodes
        if !file_type.is_dir() {
            tracing::debug!(path = %entry.path().display(), "Skipping special file");
        }
        return false;
    }

    // Unfollowed symlink: only mirror it when the target is a regular file
    match std::fs::metadata(entry.path()) {
        Ok(target) if target.is_file() => true,
        Ok(_) => {
            tracing::debug!(path = %entry.path().display(), "Skipping symlink to non-file");
            false
        }
        Err(e) => {
            tracing::debug!(path = %entry.path().display(), error = %e, "Skipping broken symlink");
            false
        }
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd.join(root),
        Err(_) => root.to_path_buf(),
    }
}
