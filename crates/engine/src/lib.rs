#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Engine
//!
//! The Flow Execution Engine: the orchestrator that drives a
//! [`nebula_workflow::Workflow`] through to completion for a single trigger
//! firing.
//!
//! This crate owns:
//! - [`FlowExecutionEngine`] -- per-trigger scope reduction, sequential
//!   topological scheduling, branch gating, continue-on-fail, and the loop
//!   node protocol
//! - [`NodeExecutor`] -- the collaborator boundary node-type plug-ins
//!   implement; this crate has no idea what `"http-request"` or `"if"`
//!   actually do
//! - [`CredentialResolver`] -- the collaborator boundary for secret storage
//! - [`ExecutionRecorder`] -- the collaborator boundary for durable
//!   persistence of execution/node lifecycle transitions
//! - [`ExecutionOutcome`] -- the terminal result handed back to whatever
//!   fired the trigger
//!
//! It deliberately does not own node-type plug-in registration, parameter
//! schemas, expression evaluation, credential storage, or execution
//! persistence -- those live behind the traits above, supplied by whatever
//! process embeds this engine.

pub mod credential;
pub mod engine;
pub mod error;
pub mod executor;
pub mod input;
pub mod outcome;
pub mod recorder;
pub mod testing;

pub use credential::{CredentialError, CredentialResolver, StaticCredentialResolver};
pub use engine::{EngineConfig, FlowExecutionEngine};
pub use error::EngineError;
pub use executor::{NodeExecResult, NodeExecutionContext, NodeExecutor, NodeExecutorError, NodePorts};
pub use outcome::ExecutionOutcome;
pub use recorder::{ExecutionRecorder, InMemoryRecorder, NullRecorder, RecordedExecution, RecordedNode};
