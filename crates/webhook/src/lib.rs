#![forbid(unsafe_code)]

//! # Nebula Webhook
//!
//! The Trigger Registry & Webhook Router (spec §4.1): resolves inbound HTTP
//! requests against registered webhook triggers, runs the access-control
//! chain, and shapes the HTTP reply according to response mode.
//!
//! This crate does not know how triggers are admitted, queued, or executed
//! — it hands resolved requests to whatever implements [`TriggerDispatcher`]
//! (the Trigger Manager, wired in by `nebula-api`) and shapes the HTTP
//! response from what that collaborator reports back.

pub mod auth;
pub mod bot;
pub mod cors;
pub mod error;
pub mod ipfilter;
pub mod limits;
pub mod multipart;
pub mod pattern;
pub mod registry;
pub mod request;
pub mod router;

pub use error::WebhookError;
pub use limits::WebhookLimits;
pub use registry::{RegisteredWebhook, ResolvedWebhook, WebhookRegistry};
pub use request::{
    BinaryEntry, CachedExecutionResult, DispatchAck, HttpResponseSpec, IncomingRequest,
    TriggerDispatcher, TriggerExecutionRequest, TriggerVariant, PRIORITY_MANUAL,
    PRIORITY_SCHEDULE, PRIORITY_WEBHOOK,
};
pub use router::{build_router, WebhookRouterState};
