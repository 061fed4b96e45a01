//! Configuration management for the mirror daemon.
//!
//! Loads configuration from a TOML (or YAML) file with `MIRROR__` environment
//! variable overrides. The configuration is read once at startup and never
//! mutated afterwards.

use crate::utils::{MirrorError, Result};
use ::config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MIRROR";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub credentials: Credentials,

    pub remote: RemoteConfig,

    /// Number of upload workers. Values <= 0 fall back to the default.
    #[serde(default = "default_concurrency")]
    pub concurrency: i64,

    /// Capacity of the shared upload queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub application_key_id: String,
    pub application_key: String,
}

// Keep the secret out of debug output and logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("application_key_id", &self.application_key_id)
            .field("application_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Custom endpoint for S3-compatible services (B2, MinIO, R2...)
    #[serde(default)]
    pub endpoint: Option<String>,

    pub region: String,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    #[serde(default)]
    pub force_path_style: bool,
}

/// What to do when a task fires while its previous pass is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new firing
    #[default]
    Skip,
    /// Wait for the running pass, then run
    Queue,
    /// Run both passes concurrently
    Allow,
}

/// Clock that cron expressions are evaluated against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleTimezone {
    /// The host's local time zone
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub overlap: OverlapPolicy,

    #[serde(default)]
    pub timezone: ScheduleTimezone,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanConfig {
    /// Follow symbolic links while walking local trees
    #[serde(default)]
    pub follow_links: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// A remote bucket and the local trees mirrored into it
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub name: String,

    #[serde(default)]
    pub tasks: Vec<BackupTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupTask {
    pub name: String,

    /// Directory whose files are mirrored
    pub local_path: PathBuf,

    /// Key prefix the files are stored under
    #[serde(default)]
    pub remote_path: String,

    /// Cron expression, with or without a seconds field
    pub schedule: String,
}

fn default_concurrency() -> i64 {
    5
}

fn default_queue_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file, format inferred from its extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        if !path.exists() {
            return Err(MirrorError::Config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }

        Self::build(::config::Config::builder().add_source(File::from(path)))
    }

    /// Parse configuration from an in-memory document.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        Self::build(::config::Config::builder().add_source(File::from_str(content, format)))
    }

    fn build(builder: ::config::ConfigBuilder<::config::builder::DefaultState>) -> Result<Self> {
        let parsed: Config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Structural checks. Cron syntax is left to registration time.
    pub fn validate(&self) -> Result<()> {
        if self.remote.region.trim().is_empty() {
            return Err(MirrorError::Config("remote.region must not be empty".into()));
        }

        for bucket in &self.buckets {
            if bucket.name.trim().is_empty() {
                return Err(MirrorError::Config("bucket name must not be empty".into()));
            }

            for task in &bucket.tasks {
                if task.name.trim().is_empty() {
                    return Err(MirrorError::Config(format!(
                        "task in bucket {} has an empty name",
                        bucket.name
                    )));
                }
                if task.local_path.as_os_str().is_empty() {
                    return Err(MirrorError::Config(format!(
                        "task {}/{} has an empty local_path",
                        bucket.name, task.name
                    )));
                }
                if task.schedule.trim().is_empty() {
                    return Err(MirrorError::Config(format!(
                        "task {}/{} has an empty schedule",
                        bucket.name, task.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Worker count, falling back to the default for non-positive values.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency <= 0 {
            tracing::warn!(
                configured = self.concurrency,
                "invalid concurrency, defaulting to {}",
                default_concurrency()
            );
            return default_concurrency() as usize;
        }
        self.concurrency as usize
    }

    pub fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            tracing::warn!(
                "invalid queue_capacity, defaulting to {}",
                default_queue_capacity()
            );
            return default_queue_capacity();
        }
        self.queue_capacity
    }
}
