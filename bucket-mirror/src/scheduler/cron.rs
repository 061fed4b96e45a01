//! [`CronScheduler`] backed by `tokio-cron-scheduler`.
//!
//! Expressions are evaluated in the configured [`ScheduleTimezone`], so
//! `0 3 * * *` fires at 03:00 host time by default.

use super::{normalize_cron, CronScheduler, JobFn, RegisterError};
use crate::config::ScheduleTimezone;
use crate::utils::{MirrorError, Result};
use async_trait::async_trait;
use chrono::{Local, Utc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

pub struct TokioCronScheduler {
    scheduler: Mutex<JobScheduler>,
    timezone: ScheduleTimezone,
}

impl TokioCronScheduler {
    pub async fn new(timezone: ScheduleTimezone) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| MirrorError::Scheduler(e.to_string()))?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            timezone,
        })
    }
}

#[async_trait]
impl CronScheduler for TokioCronScheduler {
    async fn register(&self, schedule: &str, job: JobFn) -> std::result::Result<Uuid, RegisterError> {
        let expression = normalize_cron(schedule);

        let job = match self.timezone {
            ScheduleTimezone::Local => {
                Job::new_async_tz(expression.as_str(), Local, move |_uuid, _lock| job())
            }
            ScheduleTimezone::Utc => {
                Job::new_async_tz(expression.as_str(), Utc, move |_uuid, _lock| job())
            }
        }
        .map_err(|e| match e {
            JobSchedulerError::ParseSchedule => RegisterError::InvalidExpression(schedule.to_string()),
            other => RegisterError::Scheduler(other.to_string()),
        })?;

        self.scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(|e| RegisterError::Scheduler(e.to_string()))
    }

    async fn start(&self) -> Result<()> {
        self.scheduler
            .lock()
            .await
            .start()
            .await
            .map_err(|e| MirrorError::Scheduler(e.to_string()))
    }

    async fn stop(&self) -> Result<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| MirrorError::Scheduler(e.to_string()))
    }
}
