//! Error types for the mirror daemon.
//!
//! Only startup can fail fatally; everything after the scheduler starts is
//! handled where it occurs and reported through the log.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage client error: {0}")]
    Storage(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

pub type Result<T> = std::result::Result<T, MirrorError>;
