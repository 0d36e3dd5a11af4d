//! The Result Cache (spec §4.5): a short-lived store of completed
//! execution results, consulted by `last-node` response mode and by
//! `executeTriggerAndWait`.

use std::time::Duration;

use moka::future::Cache;
use nebula_core::ExecutionId;
use tokio::time::{sleep, Instant};

use nebula_webhook::CachedExecutionResult;

/// Completed results live in the cache for this long before eviction.
const RESULT_TTL: Duration = Duration::from_secs(60);

/// How often `wait_for_result` polls the cache while a result is pending
/// (spec §4.5: `<=100ms`).
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// In-memory, time-bounded store of completed execution results.
///
/// Entries are written once, by the Trigger Manager, when an execution
/// reaches a terminal status, and read by `last-node` response mode and by
/// `executeTriggerAndWait`. The 60s TTL assumes a reader shows up within a
/// few seconds of completion; longer-lived result lookups are out of scope
/// (spec §4.5 Non-goals).
#[derive(Clone)]
pub struct ResultCache {
    cache: Cache<ExecutionId, CachedExecutionResult>,
}

impl ResultCache {
    /// Build a cache with the spec-mandated 60s TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().time_to_live(RESULT_TTL).build(),
        }
    }

    /// Record a completed execution's result.
    pub async fn set(&self, execution_id: ExecutionId, result: CachedExecutionResult) {
        self.cache.insert(execution_id, result).await;
    }

    /// Look up a result without waiting.
    pub async fn get(&self, execution_id: ExecutionId) -> Option<CachedExecutionResult> {
        self.cache.get(&execution_id).await
    }

    /// Poll for `execution_id`'s result until it appears or `timeout`
    /// elapses, at [`POLL_INTERVAL`].
    pub async fn wait_for_result(
        &self,
        execution_id: ExecutionId,
        timeout: Duration,
    ) -> Option<CachedExecutionResult> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.get(execution_id).await {
                return Some(result);
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
