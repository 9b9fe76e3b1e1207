//! Daily trigger for the auto-transfer job.
//!
//! The loop sleeps until the next configured wall-clock time, runs one pass and
//! goes back to sleep. Cancellation is honored only between passes; a run that
//! has started is allowed to finish.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use leadflow_core::config::SchedulerConfig;
use leadflow_core::errors::ApplicationError;

use crate::services::{AutoTransferJob, TransferRunReport};

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let wait = (deadline - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
        tokio::time::sleep(wait).await;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailySchedule {
    pub run_at: NaiveTime,
    pub offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(run_at: NaiveTime, offset: FixedOffset) -> Self {
        Self { run_at, offset }
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self, ApplicationError> {
        let offset = config.offset().ok_or_else(|| {
            ApplicationError::Configuration(format!(
                "scheduler.utc_offset_minutes `{}` is out of range",
                config.utc_offset_minutes
            ))
        })?;
        Ok(Self::new(config.run_at, offset))
    }

    /// Today's occurrence in the schedule's offset if it is still ahead of
    /// `now`, otherwise tomorrow's.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let local_run = local_date.and_time(self.run_at);
        let candidate =
            (local_run - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc();
        if candidate > now {
            candidate
        } else {
            candidate + Duration::days(1)
        }
    }
}

pub struct AutoTransferScheduler {
    schedule: DailySchedule,
    clock: Arc<dyn Clock>,
    job: AutoTransferJob,
    shutdown: CancellationToken,
}

impl AutoTransferScheduler {
    pub fn new(
        schedule: DailySchedule,
        clock: Arc<dyn Clock>,
        job: AutoTransferJob,
        shutdown: CancellationToken,
    ) -> Self {
        Self { schedule, clock, job, shutdown }
    }

    /// Runs until the shutdown token fires. Returns the number of passes made.
    pub async fn run(self) -> usize {
        let mut runs = 0;
        loop {
            let next_run = self.schedule.next_run_after(self.clock.now());
            info!(
                event_name = "scheduler.auto_transfer.scheduled",
                next_run_at = %next_run.to_rfc3339(),
                "next auto-transfer run scheduled"
            );

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.clock.sleep_until(next_run) => {}
            }

            match self.job.run_once(self.clock.now()).await {
                TransferRunReport::Completed { failed, .. } if failed > 0 => warn!(
                    event_name = "scheduler.auto_transfer.incomplete",
                    failed,
                    "some customers could not be transferred"
                ),
                _ => {}
            }
            runs += 1;
        }

        info!(
            event_name = "scheduler.auto_transfer.stopped",
            runs,
            "auto-transfer scheduler stopped"
        );
        runs
    }
}
