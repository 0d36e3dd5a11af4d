//! Ambient configuration, loaded from environment variables with documented
//! defaults (SPEC_FULL §4.3/§6). No config-file format is introduced; this
//! mirrors the plain-env-var style the pack's binaries already use.

use std::time::Duration;

use crate::trigger_manager::ConflictPolicy;

/// Server-wide configuration for `nebula-server`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the webhook/internal HTTP server binds to.
    pub bind_addr: String,
    /// Trigger Manager tunables.
    pub trigger_manager: TriggerManagerConfig,
    /// Schedule Manager tunables.
    pub schedule: ScheduleConfig,
}

impl ServerConfig {
    /// Build configuration from environment variables, falling back to
    /// spec-documented defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("NEBULA_WEBHOOK_BIND_ADDR", "0.0.0.0:8080"),
            trigger_manager: TriggerManagerConfig::from_env(),
            schedule: ScheduleConfig::from_env(),
        }
    }
}

/// Trigger Manager admission-control tunables (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct TriggerManagerConfig {
    /// Global concurrency cap across all workflows and users.
    pub max_concurrent_triggers: usize,
    /// Concurrency cap per workflow.
    pub max_concurrent_per_workflow: usize,
    /// Concurrency cap per user.
    pub max_concurrent_per_user: usize,
    /// Maximum pending requests held in the priority queue.
    pub max_queue_size: usize,
    /// How long a request may wait in the queue before failing with
    /// `QueueTimeout`.
    pub queue_timeout: Duration,
    /// What happens when every applicable cap is full.
    pub conflict_policy: ConflictPolicy,
    /// Per-trigger-variant execution timeouts (spec §5).
    pub manual_timeout: Duration,
    pub schedule_timeout: Duration,
    pub webhook_timeout: Duration,
}

impl TriggerManagerConfig {
    #[must_use]
    fn from_env() -> Self {
        Self {
            max_concurrent_triggers: env_usize("NEBULA_MAX_CONCURRENT_TRIGGERS", 100),
            max_concurrent_per_workflow: env_usize("NEBULA_MAX_CONCURRENT_PER_WORKFLOW", 10),
            max_concurrent_per_user: env_usize("NEBULA_MAX_CONCURRENT_PER_USER", 25),
            max_queue_size: env_usize("NEBULA_MAX_QUEUE_SIZE", 1000),
            queue_timeout: Duration::from_secs(env_usize("NEBULA_QUEUE_TIMEOUT_SECS", 30) as u64),
            conflict_policy: env_conflict_policy("NEBULA_CONFLICT_POLICY"),
            manual_timeout: Duration::from_secs(600),
            schedule_timeout: Duration::from_secs(300),
            webhook_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for TriggerManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_triggers: 100,
            max_concurrent_per_workflow: 10,
            max_concurrent_per_user: 25,
            max_queue_size: 1000,
            queue_timeout: Duration::from_secs(30),
            conflict_policy: ConflictPolicy::Queue,
            manual_timeout: Duration::from_secs(600),
            schedule_timeout: Duration::from_secs(300),
            webhook_timeout: Duration::from_secs(30),
        }
    }
}

/// Schedule Manager tunables (spec §4.2).
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    /// How often the tick loop checks for due jobs.
    pub tick_interval: Duration,
    /// Attempt limit for firing retries.
    pub max_firing_attempts: u32,
    /// Base backoff between firing retries.
    pub retry_base_delay: Duration,
    /// Backoff multiplier applied per retry attempt.
    pub retry_multiplier: u32,
}

impl ScheduleConfig {
    #[must_use]
    fn from_env() -> Self {
        Self {
            tick_interval: Duration::from_secs(env_usize("NEBULA_SCHEDULE_TICK_SECS", 1) as u64),
            max_firing_attempts: env_usize("NEBULA_SCHEDULE_MAX_ATTEMPTS", 3) as u32,
            retry_base_delay: Duration::from_secs(2),
            retry_multiplier: 2,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_firing_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
            retry_multiplier: 2,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_conflict_policy(key: &str) -> ConflictPolicy {
    match std::env::var(key).ok().as_deref() {
        Some("reject") => ConflictPolicy::Reject,
        Some("cancel-oldest") => ConflictPolicy::CancelOldest,
        _ => ConflictPolicy::Queue,
    }
}
