//! Cron scheduling.
//!
//! The engine never owns the clock: it registers callbacks with a
//! [`CronScheduler`] and only provides their bodies.

pub mod binding;
pub mod cron;

use crate::utils::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use binding::{ScheduleReport, TaskBinding, TaskRef};
pub use cron::TokioCronScheduler;

/// Callback run on every firing of a registered schedule
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("invalid cron expression {0:?}")]
    InvalidExpression(String),

    #[error("scheduler rejected job: {0}")]
    Scheduler(String),
}

#[async_trait]
pub trait CronScheduler: Send + Sync {
    /// Register `job` to run on `schedule`
    async fn register(&self, schedule: &str, job: JobFn) -> std::result::Result<Uuid, RegisterError>;

    /// Start firing registered jobs
    async fn start(&self) -> Result<()>;

    /// Stop the clock. Passes already running are not interrupted.
    async fn stop(&self) -> Result<()>;
}

/// Accept classic 5-field crontab lines by adding a leading seconds field.
/// Anything else is passed through untouched.
pub fn normalize_cron(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}
