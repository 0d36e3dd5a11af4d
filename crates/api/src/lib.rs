#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula API
//!
//! The runtime glue that turns the Flow Execution Engine and the webhook
//! ingress surface into a running server: admission control (the Trigger
//! Manager, spec §4.3), the Result Cache (spec §4.5), durable cron
//! scheduling (the Schedule Manager, spec §4.2), and the Workflow Sync
//! Facade (spec §4.7/§2) that keeps the other two in sync with saved
//! workflows.
//!
//! This crate owns no node-type execution logic and no workflow storage;
//! both are supplied by the embedding binary through the collaborator
//! traits `nebula-engine` and `nebula-webhook` already define.

pub mod config;
pub mod error;
pub mod result_cache;
pub mod schedule;
pub mod sync;
pub mod trigger_manager;

pub use config::{ScheduleConfig, ServerConfig, TriggerManagerConfig};
pub use error::ApiError;
pub use result_cache::ResultCache;
pub use schedule::{ScheduleManager, ScheduledJob};
pub use sync::WorkflowSyncFacade;
pub use trigger_manager::{ConflictPolicy, InMemoryWorkflowStore, TriggerManager, TriggerManagerStats, WorkflowSource};
