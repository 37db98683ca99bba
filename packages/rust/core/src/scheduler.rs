//! Cron-driven scheduler and the on-demand trigger entry point.

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use jobflow_shared::{AppConfig, FetchRequest, JobflowError, Result, TriggerKind, WorkflowId};
use tracing::{debug, info, warn};

use crate::workflow::Orchestrator;

/// Parse a cron expression. Five-field expressions get a leading `0`
/// seconds field.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };

    Schedule::from_str(&normalized)
        .map_err(|e| JobflowError::config(format!("invalid cron expression '{expr}': {e}")))
}

/// Starts scheduled runs on a cron cadence and on-demand runs via [`Scheduler::trigger`].
pub struct Scheduler {
    orchestrator: Orchestrator,
    cron: String,
    schedule: Schedule,
    enabled: bool,
    defaults: FetchRequest,
    scheduled: FetchRequest,
}

impl Scheduler {
    pub fn new(orchestrator: Orchestrator, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            orchestrator,
            cron: config.schedule.cron.clone(),
            schedule: parse_cron(&config.schedule.cron)?,
            enabled: config.schedule.enabled,
            defaults: config.default_request(),
            scheduled: config.scheduled_request(),
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Start an on-demand run, filling omitted fields from the defaults.
    pub fn trigger(
        &self,
        platforms: Option<Vec<String>>,
        location: Option<String>,
        keywords: Option<Vec<String>>,
    ) -> Result<WorkflowId> {
        let request = FetchRequest {
            platforms: platforms.unwrap_or_else(|| self.defaults.platforms.clone()),
            location: location.unwrap_or_else(|| self.defaults.location.clone()),
            keywords: keywords.unwrap_or_else(|| self.defaults.keywords.clone()),
        };
        self.orchestrator.start(request, TriggerKind::Manual)
    }

    /// Start one scheduled run. A failure to start is logged, not returned.
    pub fn tick(&self) -> Option<WorkflowId> {
        match self
            .orchestrator
            .start(self.scheduled.clone(), TriggerKind::Scheduled)
        {
            Ok(id) => {
                info!(workflow_id = %id, "scheduled workflow started");
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "scheduled workflow could not start");
                None
            }
        }
    }

    /// First fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Tick on every fire time until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        if !self.enabled {
            info!("schedule disabled, waiting for shutdown");
            shutdown.await;
            return;
        }

        info!(cron = %self.cron, "scheduler started");
        let mut last_fired = None;
        loop {
            let now = Utc::now();
            let Some(next) = self.next_slot(now, last_fired) else {
                warn!("schedule has no upcoming fire time, stopping");
                break;
            };
            let delay = (next - now).to_std().unwrap_or_default();
            debug!(%next, delay_ms = delay.as_millis() as u64, "waiting for next tick");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {
                    self.tick();
                    last_fired = Some(next);
                }
            }
        }
        info!("scheduler stopped");
    }

    /// Next fire time after `now`, never at or before the slot already fired.
    fn next_slot(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let after = last_fired.map_or(now, |fired| fired.max(now));
        self.next_fire_after(after)
    }
}
