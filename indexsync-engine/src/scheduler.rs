//! Idempotent queuing of the attribute sync cron job.

use crate::config::SchedulerConfig;
use chrono::{DateTime, Duration, Utc};
use indexsync_store::{ScheduleError, ScheduleStore};
use std::sync::Arc;
use tracing::{debug, error};

/// Queues one pending run of a job, a few minutes out.
///
/// Called from best-effort hooks, so it never fails: a run that is already
/// pending is expected, and any other error is only logged.
pub struct CronScheduler {
    store: Arc<dyn ScheduleStore>,
    job_code: String,
    delay: Duration,
}

impl CronScheduler {
    pub fn new(store: Arc<dyn ScheduleStore>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            job_code: config.job_code.clone(),
            delay: Duration::minutes(config.delay_minutes),
        }
    }

    pub fn job_code(&self) -> &str {
        &self.job_code
    }

    pub fn execute(&self) {
        self.execute_at(Utc::now());
    }

    pub fn execute_at(&self, now: DateTime<Utc>) {
        let scheduled_at = now + self.delay;
        match self.store.insert_pending(&self.job_code, now, scheduled_at) {
            Ok(id) => debug!(
                job_code = self.job_code.as_str(),
                %scheduled_at,
                schedule_id = id.0,
                "scheduled cron job"
            ),
            Err(ScheduleError::Duplicate(_)) => {}
            Err(e) => error!(
                job_code = self.job_code.as_str(),
                error = %e,
                "failed to schedule cron job"
            ),
        }
    }
}
