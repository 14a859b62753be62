//! Run scheduling
//!
//! `Schedule` computes the next tick; `Scheduler` drives the pipeline on it
//! until shutdown.

use crate::pipeline::NoticePipeline;
use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use noticewatch_common::clock::{Clock, SystemClock};
use noticewatch_common::config::ScheduleConfig;
use noticewatch_common::errors::{AppError, Result};
use noticewatch_common::models::DeliveryReport;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed local wall-clock times every day
    Daily {
        times: Vec<NaiveTime>,
        offset: FixedOffset,
    },
    /// Fixed period from the previous tick
    Interval(Duration),
}

impl Schedule {
    /// `interval_secs` wins over `daily_times` when both are set
    pub fn from_config(config: &ScheduleConfig, offset: FixedOffset) -> Result<Self> {
        if let Some(secs) = config.interval_secs {
            return Ok(Schedule::Interval(Duration::from_secs(secs.max(1))));
        }

        let times = config.parsed_daily_times()?;
        if times.is_empty() {
            return Err(AppError::config(
                "schedule needs daily_times or interval_secs",
            ));
        }

        Ok(Schedule::Daily { times, offset })
    }

    /// First tick strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Interval(period) => {
                now + chrono::Duration::from_std(*period).unwrap_or(chrono::Duration::days(1))
            }
            Schedule::Daily { times, offset } => {
                let today = now.with_timezone(offset).date_naive();
                [Some(today), today.succ_opt()]
                    .into_iter()
                    .flatten()
                    .flat_map(|date| times.iter().map(move |time| date.and_time(*time)))
                    .filter_map(|local| offset.from_local_datetime(&local).single())
                    .map(|tick| tick.with_timezone(&Utc))
                    .find(|tick| *tick > now)
                    .unwrap_or_else(|| now + chrono::Duration::days(1))
            }
        }
    }
}

pub struct Scheduler {
    pipeline: Arc<NoticePipeline>,
    schedule: Schedule,
    run_on_start: bool,
    run_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<NoticePipeline>,
        schedule: Schedule,
        run_on_start: bool,
        run_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            schedule,
            run_on_start,
            run_timeout,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// One run bounded by the run timeout; `None` if it was abandoned
    pub async fn run_once(&self) -> Option<DeliveryReport> {
        match tokio::time::timeout(self.run_timeout, self.pipeline.run()).await {
            Ok(report) => Some(report),
            Err(_) => {
                error!(
                    timeout_secs = self.run_timeout.as_secs(),
                    "Run exceeded its time budget and was abandoned"
                );
                None
            }
        }
    }

    /// Run on every tick until `shutdown` resolves; returns the number of runs started.
    ///
    /// A run already in progress is allowed to finish.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut runs = 0;

        if self.run_on_start {
            self.run_once().await;
            runs += 1;
        }

        loop {
            let now = self.clock.now();
            let next = self.schedule.next_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, wait_secs = wait.as_secs(), "Next run scheduled");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    if self.run_once().await.is_none() {
                        warn!("Retrying at the next tick");
                    }
                    runs += 1;
                }
            }
        }

        runs
    }
}
