//! The Schedule Manager (spec §4.2): durable cron scheduling for every
//! active schedule trigger of every active workflow.
//!
//! Production Nebula mirrors `ScheduledJob` rows into a distributed job
//! queue so cron firings survive restarts and rebalance across worker
//! replicas (spec §2's Schedule Persistence Layer). A single-process
//! deployment has no such queue to mirror into, so this manager *is* the
//! durable store: an in-memory `DashMap` reloaded from workflow
//! definitions on startup, ticked by its own background task. Swapping in
//! a real persistence/queue backend means replacing [`ScheduledJob`]
//! storage and the tick loop's firing sink, not the admission, diff, or
//! retry logic below.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use nebula_core::{NodeId, TriggerId, WorkflowId};
use nebula_workflow::{ScheduleMode, ScheduleSettings, SimpleInterval, TriggerDefinition, Workflow};

use crate::config::ScheduleConfig;
use crate::error::ApiError;
use crate::trigger_manager::TriggerManager;

use nebula_webhook::{TriggerExecutionRequest, TriggerVariant, PRIORITY_SCHEDULE};

/// A durable cron-job record (spec §3 `ScheduledJob`).
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// The workflow that owns this job.
    pub workflow_id: WorkflowId,
    /// The schedule trigger this job was registered for.
    pub trigger_id: TriggerId,
    /// The node execution starts from on firing.
    pub node_id: NodeId,
    /// 5-field cron expression (minute, hour, day-of-month, month,
    /// day-of-week).
    pub cron_expression: String,
    /// IANA timezone the cron fields are evaluated in.
    pub timezone: String,
    /// Whether this job is currently enqueued for firing.
    pub active: bool,
    /// The last time this job fired, if ever.
    pub last_run: Option<DateTime<Utc>>,
    /// The next time this job is due to fire.
    pub next_run: Option<DateTime<Utc>>,
    /// Consecutive firing failures since the last success.
    pub failure_count: u32,
    /// The most recent firing error, if any.
    pub last_error: Option<String>,
}

fn job_key(workflow_id: WorkflowId, trigger_id: TriggerId) -> String {
    format!("{workflow_id}-{trigger_id}")
}

/// Durable cron scheduling, reload-on-restart, and workflow-save
/// reconciliation for schedule triggers.
pub struct ScheduleManager {
    jobs: DashMap<String, ScheduledJob>,
    trigger_manager: Arc<TriggerManager>,
    config: ScheduleConfig,
    /// Back-reference so the tick loop can hold an owned `Arc<Self>` from
    /// `&self`-only call sites, mirroring `TriggerManager::self_weak`.
    self_weak: std::sync::Weak<Self>,
}

impl ScheduleManager {
    /// Build a Schedule Manager; starts with no jobs. Call [`Self::reload`]
    /// with the current workflow set before starting the tick loop.
    #[must_use]
    pub fn new(trigger_manager: Arc<TriggerManager>, config: ScheduleConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            jobs: DashMap::new(),
            trigger_manager,
            config,
            self_weak: weak.clone(),
        })
    }

    fn self_arc(&self) -> Arc<Self> {
        self.self_weak
            .upgrade()
            .expect("ScheduleManager is always held by an Arc for its own lifetime")
    }

    /// Durability protocol, startup half: clear every job and re-register
    /// one per active schedule trigger of every active workflow (spec
    /// §4.2).
    ///
    /// # Errors
    /// Returns the first [`ApiError::InvalidCron`] encountered; a workflow
    /// whose schedule settings were valid at save time should never fail
    /// here, but a corrupted store is surfaced rather than silently
    /// dropping jobs.
    pub fn reload<'a>(&self, workflows: impl IntoIterator<Item = &'a Workflow>) -> Result<(), ApiError> {
        self.jobs.clear();
        for workflow in workflows {
            if !workflow.active {
                continue;
            }
            self.sync_workflow(workflow)?;
        }
        Ok(())
    }

    /// Durability protocol, save-time half: diff this workflow's current
    /// schedule triggers against existing `ScheduledJob` rows, deleting
    /// rows whose triggers are gone and upserting rows for current
    /// triggers. An inactive workflow has all its rows removed.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidCron`] if a trigger's cron expression is
    /// malformed.
    pub fn sync_workflow(&self, workflow: &Workflow) -> Result<(), ApiError> {
        let current: Vec<(TriggerId, NodeId, &ScheduleSettings, bool)> = workflow
            .triggers
            .iter()
            .filter_map(|trigger| match trigger {
                TriggerDefinition::Schedule { id, node_id, active, settings } => {
                    Some((*id, *node_id, settings, *active))
                }
                _ => None,
            })
            .collect();
        let current_ids: HashSet<TriggerId> = current.iter().map(|(id, ..)| *id).collect();

        let stale_keys: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().workflow_id == workflow.id && !current_ids.contains(&entry.value().trigger_id))
            .map(|entry| entry.key().clone())
            .collect();
        for key in stale_keys {
            self.jobs.remove(&key);
        }

        if !workflow.active {
            let keys: Vec<String> = self
                .jobs
                .iter()
                .filter(|entry| entry.value().workflow_id == workflow.id)
                .map(|entry| entry.key().clone())
                .collect();
            for key in keys {
                if let Some((_, mut job)) = self.jobs.remove(&key) {
                    job.active = false;
                }
            }
            return Ok(());
        }

        for (trigger_id, node_id, settings, active) in current {
            if !active {
                self.jobs.remove(&job_key(workflow.id, trigger_id));
                continue;
            }
            self.register(workflow.id, trigger_id, node_id, settings)?;
        }
        Ok(())
    }

    /// Register (or replace) one job from its authored `ScheduleSettings`,
    /// validating the cron expression (spec §4.2: "validated on
    /// registration and rejected if malformed").
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidCron`] if the expression does not parse.
    pub fn register(
        &self,
        workflow_id: WorkflowId,
        trigger_id: TriggerId,
        node_id: NodeId,
        settings: &ScheduleSettings,
    ) -> Result<(), ApiError> {
        let next_run = next_fire_time(&settings.cron_expression, &settings.timezone, Utc::now())?;
        self.jobs.insert(
            job_key(workflow_id, trigger_id),
            ScheduledJob {
                workflow_id,
                trigger_id,
                node_id,
                cron_expression: settings.cron_expression.clone(),
                timezone: settings.timezone.clone(),
                active: true,
                last_run: None,
                next_run: Some(next_run),
                failure_count: 0,
                last_error: None,
            },
        );
        Ok(())
    }

    /// Remove a job outright (trigger deleted from its workflow).
    pub fn unregister(&self, workflow_id: WorkflowId, trigger_id: TriggerId) {
        self.jobs.remove(&job_key(workflow_id, trigger_id));
    }

    /// Snapshot of every registered job, for an internal status endpoint.
    #[must_use]
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Run one tick: fire every active job whose `next_run` has passed.
    pub async fn tick(&self) {
        let due: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.active && job.next_run.is_some_and(|next| next <= Utc::now())
            })
            .map(|entry| entry.key().clone())
            .collect();

        for key in due {
            let manager = self.self_arc();
            tokio::spawn(async move {
                manager.fire(&key).await;
            });
        }
    }

    /// Start the tick loop as a background task, firing due jobs every
    /// `config.tick_interval`.
    #[must_use]
    pub fn spawn_tick_loop(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.self_arc();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.tick_interval);
            loop {
                interval.tick().await;
                manager.tick().await;
            }
        })
    }

    async fn fire(self: Arc<Self>, key: &str) {
        let Some(job) = self.jobs.get(key).map(|entry| entry.value().clone()) else {
            return;
        };

        let request = TriggerExecutionRequest {
            trigger_id: job.trigger_id,
            workflow_id: job.workflow_id,
            node_id: job.node_id,
            variant: TriggerVariant::Schedule,
            priority: PRIORITY_SCHEDULE,
            payload: serde_json::json!({"scheduledAt": Utc::now()}),
            response_mode: None,
            test_mode: false,
        };

        let mut last_error = None;
        let mut succeeded = false;
        for attempt in 0..self.config.max_firing_attempts {
            match self.trigger_manager.admit(request.clone()).await {
                Ok(_execution_id) => {
                    succeeded = true;
                    break;
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 < self.config.max_firing_attempts {
                        let backoff = self.config.retry_base_delay
                            * self.config.retry_multiplier.pow(attempt);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        if let Some(mut entry) = self.jobs.get_mut(key) {
            let now = Utc::now();
            entry.last_run = Some(now);
            entry.next_run = next_fire_time(&entry.cron_expression, &entry.timezone, now).ok();
            if succeeded {
                entry.failure_count = 0;
                entry.last_error = None;
            } else {
                entry.failure_count += 1;
                entry.last_error = last_error;
            }
        }
    }
}

/// Parse a 5-field (minute, hour, day-of-month, month, day-of-week) cron
/// expression into a schedule, and compute the next firing time at or
/// after `after` in `timezone`.
///
/// # Errors
/// Returns [`ApiError::InvalidCron`] if the expression or timezone is
/// malformed.
pub fn next_fire_time(cron_expression: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, ApiError> {
    let schedule = parse_cron(cron_expression)?;
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ApiError::InvalidCron(format!("unknown timezone: {timezone}")))?;
    let after_local = after.with_timezone(&tz);
    let next = schedule
        .after(&after_local)
        .next()
        .ok_or_else(|| ApiError::InvalidCron(cron_expression.to_string()))?;
    Ok(next.with_timezone(&Utc))
}

/// The `cron` crate parses a leading seconds field; the spec's cron rows
/// are 5-field (minute hour dom month dow), so `"0 "` is prefixed before
/// handing the expression to the parser.
fn parse_cron(expression: &str) -> Result<cron::Schedule, ApiError> {
    cron::Schedule::from_str(&format!("0 {expression}"))
        .map_err(|error| ApiError::InvalidCron(format!("{expression}: {error}")))
}

/// Normalize a [`ScheduleMode`] into the 5-field cron expression every
/// `ScheduledJob` row stores, validating it in the process.
///
/// `Datetime` schedules normalize to the cron fields matching that exact
/// minute/hour/day/month/weekday; callers are expected to deactivate the
/// trigger after its first firing since a bare 5-field expression has no
/// year component and would otherwise recur next year.
///
/// # Errors
/// Returns [`ApiError::InvalidCron`] for an expression that fails to parse
/// once built.
pub fn schedule_mode_to_cron(mode: &ScheduleMode) -> Result<String, ApiError> {
    let expression = match mode {
        ScheduleMode::Cron { expression } => expression.clone(),
        ScheduleMode::Simple { interval, every } => match interval {
            SimpleInterval::Minute => format!("*/{every} * * * *"),
            SimpleInterval::Hour => format!("0 */{every} * * *"),
            SimpleInterval::Day => format!("0 0 */{every} * *"),
            // A 5-field cron expression has no step syntax for the
            // day-of-week field, so "every N weeks" isn't expressible here;
            // `every` is ignored and this always fires weekly, every Sunday
            // at midnight.
            SimpleInterval::Week => "0 0 * * 0".to_string(),
        },
        ScheduleMode::Datetime { at } => {
            use chrono::{Datelike, Timelike};
            format!("{} {} {} {} *", at.minute(), at.hour(), at.day(), at.month())
        }
    };
    parse_cron(&expression)?;
    Ok(expression)
}
