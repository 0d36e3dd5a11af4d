//! Node execution state machine.

use serde::{Deserialize, Serialize};

/// The execution state of a single node within a running workflow.
///
/// Distinct from [`crate::Workflow`]'s static definition — this is the
/// per-execution, per-node status the Flow Execution Engine assigns as it
/// works through the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Not yet considered by the scheduler.
    Idle,
    /// Enqueued, waiting on dependencies or a scheduler slot.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully (or via continue-on-fail).
    Completed,
    /// Finished with an unrecovered error.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
    /// Gated out because no upstream branch delivered data.
    Skipped,
}

impl NodeState {
    /// Returns `true` if the node has reached a final state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }

    /// Returns `true` if the node is actively being worked on.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(NodeState::Completed.is_terminal());
        assert!(NodeState::Failed.is_terminal());
        assert!(NodeState::Cancelled.is_terminal());
        assert!(NodeState::Skipped.is_terminal());
        assert!(!NodeState::Idle.is_terminal());
        assert!(!NodeState::Queued.is_terminal());
        assert!(!NodeState::Running.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(NodeState::Queued.is_active());
        assert!(NodeState::Running.is_active());
        assert!(!NodeState::Idle.is_active());
        assert!(!NodeState::Completed.is_active());
    }

    #[test]
    fn display_snake_case() {
        assert_eq!(NodeState::Idle.to_string(), "idle");
        assert_eq!(NodeState::Running.to_string(), "running");
    }

    #[test]
    fn serde_rename_snake_case() {
        let json = serde_json::to_string(&NodeState::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: NodeState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeState::Cancelled);
    }
}
