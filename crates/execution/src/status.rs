//! Execution-level status tracking.

use serde::{Deserialize, Serialize};

/// The overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created but not yet started.
    Created,
    /// Actively running nodes.
    Running,
    /// Temporarily paused by the user or system.
    Paused,
    /// Cancellation has been requested; waiting for active nodes to drain.
    Cancelling,
    /// All nodes that ran completed successfully.
    Completed,
    /// Some nodes executed and failed, some completed; the run was not
    /// cancelled (spec §4.4 completion rule for `continueOnFail` runs).
    Partial,
    /// Every node that executed failed (or the scope could not be entered
    /// at all), and none completed.
    Failed,
    /// Cancelled after a cancellation request was fully processed.
    Cancelled,
    /// The execution exceeded its wall-clock time budget.
    TimedOut,
}

impl ExecutionStatus {
    /// Returns `true` if the execution has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Partial | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Returns `true` if the execution is currently doing work.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }

    /// Returns `true` if the execution completed with no node failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if the execution ended with no node completing
    /// successfully. A [`Self::Partial`] outcome is neither success nor
    /// failure by this measure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }

    /// Returns `true` if this execution mixed successes and failures.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial)
    }

    /// Derive the terminal status from the final tally of executed nodes
    /// (spec §4.4): completed if none failed, partial if some of each,
    /// failed if none completed among those that ran.
    #[must_use]
    pub fn from_node_tally(completed: usize, failed: usize) -> Self {
        match (completed > 0, failed > 0) {
            (true, false) => Self::Completed,
            (true, true) => Self::Partial,
            (false, _) => Self::Failed,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Partial.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(ExecutionStatus::TimedOut.is_terminal());

        assert!(!ExecutionStatus::Created.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
        assert!(!ExecutionStatus::Cancelling.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(ExecutionStatus::Running.is_active());
        assert!(ExecutionStatus::Cancelling.is_active());

        assert!(!ExecutionStatus::Created.is_active());
        assert!(!ExecutionStatus::Paused.is_active());
        assert!(!ExecutionStatus::Completed.is_active());
    }

    #[test]
    fn success_state() {
        assert!(ExecutionStatus::Completed.is_success());
        assert!(!ExecutionStatus::Partial.is_success());
        assert!(!ExecutionStatus::Failed.is_success());
        assert!(!ExecutionStatus::Running.is_success());
    }

    #[test]
    fn failure_states() {
        assert!(ExecutionStatus::Failed.is_failure());
        assert!(ExecutionStatus::TimedOut.is_failure());
        assert!(!ExecutionStatus::Partial.is_failure());
        assert!(!ExecutionStatus::Completed.is_failure());
        assert!(!ExecutionStatus::Cancelled.is_failure());
    }

    #[test]
    fn partial_state() {
        assert!(ExecutionStatus::Partial.is_partial());
        assert!(!ExecutionStatus::Completed.is_partial());
        assert!(!ExecutionStatus::Failed.is_partial());
    }

    #[test]
    fn from_node_tally_all_completed() {
        assert_eq!(
            ExecutionStatus::from_node_tally(3, 0),
            ExecutionStatus::Completed
        );
    }

    #[test]
    fn from_node_tally_mixed() {
        assert_eq!(
            ExecutionStatus::from_node_tally(2, 1),
            ExecutionStatus::Partial
        );
    }

    #[test]
    fn from_node_tally_all_failed() {
        assert_eq!(
            ExecutionStatus::from_node_tally(0, 2),
            ExecutionStatus::Failed
        );
    }

    #[test]
    fn from_node_tally_nothing_ran() {
        assert_eq!(
            ExecutionStatus::from_node_tally(0, 0),
            ExecutionStatus::Failed
        );
    }

    #[test]
    fn display_formatting() {
        assert_eq!(ExecutionStatus::Created.to_string(), "created");
        assert_eq!(ExecutionStatus::Running.to_string(), "running");
        assert_eq!(ExecutionStatus::Paused.to_string(), "paused");
        assert_eq!(ExecutionStatus::Cancelling.to_string(), "cancelling");
        assert_eq!(ExecutionStatus::Completed.to_string(), "completed");
        assert_eq!(ExecutionStatus::Partial.to_string(), "partial");
        assert_eq!(ExecutionStatus::Failed.to_string(), "failed");
        assert_eq!(ExecutionStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(ExecutionStatus::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn serde_roundtrip() {
        let statuses = [
            ExecutionStatus::Created,
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            ExecutionStatus::Cancelling,
            ExecutionStatus::Completed,
            ExecutionStatus::Partial,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
            ExecutionStatus::TimedOut,
        ];

        for status in &statuses {
            let json = serde_json::to_string(status).unwrap();
            let back: ExecutionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(*status, back, "roundtrip failed for {status}");
        }
    }

    #[test]
    fn serde_rename_snake_case() {
        let json = serde_json::to_string(&ExecutionStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");

        let json = serde_json::to_string(&ExecutionStatus::Created).unwrap();
        assert_eq!(json, "\"created\"");
    }

    #[test]
    fn copy_semantics() {
        let a = ExecutionStatus::Running;
        let b = a;
        assert_eq!(a, b);
    }
}
