#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Telemetry
//!
//! Metrics and the telemetry facade for the Nebula workflow engine.
//!
//! This crate provides:
//! - [`MetricsRegistry`] -- in-memory counters/gauges/histograms
//! - [`TelemetryService`] trait -- pluggable telemetry backend
//! - [`NoopTelemetry`] -- no-op implementation for testing/MVP
//!
//! Event distribution lives in
//! [`nebula_eventbus`](../nebula_eventbus/index.html); this crate consumes
//! it rather than owning it.

pub mod metrics;
pub mod service;

pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry, NoopMetricsRegistry};
pub use service::{NoopTelemetry, TelemetryService};
