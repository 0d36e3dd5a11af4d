#![forbid(unsafe_code)]

//! Shared identifiers used across the Nebula workflow runtime crates.
//!
//! Every other crate in the workspace depends on this one for its
//! entity identifiers, so that a `WorkflowId` can never be passed where
//! a `NodeId` is expected.

pub mod id;

pub use id::{ExecutionId, NodeId, TriggerId, UserId, UuidParseError, WorkflowId};
