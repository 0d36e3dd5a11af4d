#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Execution
//!
//! Runtime execution state and the Standardized Node Output for the Nebula
//! workflow engine.
//!
//! This crate models execution-time concepts — it does NOT contain the
//! engine orchestrator, that is [`nebula_engine`](../nebula_engine/index.html)'s
//! job. It defines:
//!
//! - [`ExecutionStatus`] — execution-level state machine
//! - [`ExecutionState`] and [`NodeExecutionState`] — persistent state tracking
//! - [`ExecutionContext`] — runtime context with shared state and cancellation
//! - [`NodeOutput`], [`Item`], [`NodeInput`] — the node data-flow contract
//! - State machine transitions validated by the [`transition`] module

pub mod context;
pub mod error;
pub mod output;
pub mod state;
pub mod status;
pub mod transition;

pub use context::ExecutionContext;
pub use error::ExecutionError;
pub use output::{BinaryData, Item, NodeInput, NodeOutput, OutputMetadata};
pub use state::{ExecutionState, NodeExecutionState};
pub use status::ExecutionStatus;
