//! Unique identifiers for Nebula entities.
//!
//! This module provides strongly-typed UUID identifiers for various Nebula
//! entities using [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>`
//! wrappers. Each identifier type is parameterized by a unique domain marker,
//! providing compile-time type safety that prevents mixing different ID types.
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers — UUID-based, Copy, 16 bytes each
define_uuid!(UserIdDomain => UserId);
define_uuid!(ExecutionIdDomain => ExecutionId);
define_uuid!(WorkflowIdDomain => WorkflowId);
define_uuid!(NodeIdDomain => NodeId);
define_uuid!(TriggerIdDomain => TriggerId);
