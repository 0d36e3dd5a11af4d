//! Workflow-level settings.

use serde::{Deserialize, Serialize};

/// Whether error/success execution data is retained at all, or not at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveDataMode {
    /// Persist full input/output data.
    #[default]
    All,
    /// Persist nothing beyond status and timestamps.
    None,
}

/// Recognized per-workflow settings (spec §3). Unknown keys are preserved
/// under `extra` so a saved-then-reloaded workflow round-trips losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Whether the engine persists Execution/NodeExecution rows at all.
    #[serde(default = "default_true")]
    pub save_execution_to_database: bool,
    /// IANA timezone used for this workflow's schedule triggers lacking
    /// their own timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Whether per-node progress is persisted as the run proceeds, rather
    /// than only at completion.
    #[serde(default)]
    pub save_execution_progress: bool,
    /// Retention mode for data belonging to failed executions.
    #[serde(default)]
    pub save_data_error_execution: SaveDataMode,
    /// Retention mode for data belonging to successful executions.
    #[serde(default)]
    pub save_data_success_execution: SaveDataMode,
    /// Unrecognized settings, preserved for round-trip fidelity.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            save_execution_to_database: true,
            timezone: default_timezone(),
            save_execution_progress: false,
            save_data_error_execution: SaveDataMode::All,
            save_data_success_execution: SaveDataMode::All,
            extra: serde_json::Map::new(),
        }
    }
}
