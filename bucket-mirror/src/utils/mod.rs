//! Utility modules for the mirror daemon.

pub mod errors;
pub mod logger;

pub use errors::{MirrorError, Result};
