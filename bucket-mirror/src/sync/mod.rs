//! Differential sync: remote index, diff against the local tree, and the
//! pass that feeds the upload queue.

pub mod diff;
pub mod index;
pub mod key;
pub mod pass;

pub use index::{build_remote_index, IndexError, RemoteKeySet};
pub use pass::{run_pass, PassError, PassSummary};
