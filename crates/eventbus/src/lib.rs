#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Event Bus
//!
//! Generic event distribution: a broadcast [`EventBus`] carrying
//! [`ExecutionEvent`]s from the Flow Execution Engine to any number of
//! subscribers (the telemetry facade, a websocket relay, test harnesses).
//!
//! Events are projections, **not** the source of truth — the Schedule
//! Persistence Layer's execution state is authoritative.

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventSubscriber};
pub use event::ExecutionEvent;
