//! Bucket Mirror Library
//!
//! Periodically mirrors local directory trees into object-storage buckets:
//! on each cron firing, files missing remotely are uploaded through a
//! bounded pool of workers.

pub mod config;
pub mod daemon;
pub mod fs;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod transfer;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::MirrorError;
pub type Result<T> = std::result::Result<T, MirrorError>;
