//! Destination key computation.
//!
//! The remote index and the local scanner must agree on keys byte for byte,
//! so both go through this module.

use std::path::{Component, Path};

/// Split a remote prefix into its non-empty segments. Both `/` and `\` count
/// as separators.
fn prefix_segments(remote_path: &str) -> impl Iterator<Item = &str> {
    remote_path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
}

/// Normalised form of a task's remote path: no leading, trailing or
/// duplicate separators.
pub fn normalize_prefix(remote_path: &str) -> String {
    prefix_segments(remote_path).collect::<Vec<_>>().join("/")
}

/// Prefix used to list a task's existing objects. Ends with `/` unless the
/// task mirrors into the bucket root, so sibling prefixes such as
/// `albums/2024-old` are not listed for `albums/2024`.
pub fn listing_prefix(remote_path: &str) -> String {
    let prefix = normalize_prefix(remote_path);
    if prefix.is_empty() {
        prefix
    } else {
        format!("{prefix}/")
    }
}

/// Key for a file at `relative` (relative to the task root) under
/// `remote_path`. Platform separators are normalised to `/`.
pub fn object_key(remote_path: &str, relative: &Path) -> String {
    let mut segments: Vec<String> = prefix_segments(remote_path).map(str::to_string).collect();

    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            // Walk output never contains these.
            Component::ParentDir | Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    segments.join("/")
}
