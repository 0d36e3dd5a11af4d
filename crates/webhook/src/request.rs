//! The inbound webhook request shape and the outbound
//! [`TriggerExecutionRequest`] the router hands off to a [`TriggerDispatcher`]
//! (spec §4.1, §6).

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use nebula_core::{ExecutionId, NodeId, TriggerId, WorkflowId};
use nebula_workflow::ResponseMode;
use serde::{Deserialize, Serialize};

use crate::error::WebhookError;

/// Everything the router extracts from an inbound HTTP request before
/// running the access-control chain (spec §4.1).
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// HTTP method.
    pub method: nebula_workflow::HttpMethod,
    /// Path, stripped of query string and of the `/webhook[/testing]`
    /// mount prefix.
    pub path: String,
    /// Request headers, lower-cased names to values.
    pub headers: HashMap<String, String>,
    /// Parsed query parameters.
    pub query: HashMap<String, String>,
    /// Parsed JSON body, if any was present and `rawBody` is not set.
    pub json_body: Option<serde_json::Value>,
    /// Raw request body, always available regardless of `rawBody`.
    pub raw_body: Vec<u8>,
    /// Base64-encoded file uploads captured from a multipart body, keyed by
    /// the uploaded field name (spec §6).
    pub files: HashMap<String, BinaryEntry>,
    /// The caller's IP address, if determinable from the connection or a
    /// trusted proxy header.
    pub client_ip: Option<IpAddr>,
    /// The `User-Agent` header value, if present.
    pub user_agent: Option<String>,
    /// `true` when the request was routed through `/webhook/testing/...`
    /// or carries `?test=true`.
    pub test_mode: bool,
}

impl IncomingRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers.get(&name).map(String::as_str)
    }
}

/// One uploaded file, normalized to the shape spec §6 describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryEntry {
    /// Base64-encoded file contents.
    pub data: String,
    /// Declared MIME type, if the client sent one.
    pub mime_type: String,
    /// Original filename, if the client sent one.
    pub file_name: String,
    /// Size of the decoded file, in bytes.
    pub file_size: usize,
}

/// The priority class assigned to a dispatched trigger (spec §4.3);
/// `1` is highest.
pub const PRIORITY_MANUAL: u8 = 1;
/// Default priority for webhook-originated requests.
pub const PRIORITY_WEBHOOK: u8 = 2;
/// Default priority for schedule-originated requests.
pub const PRIORITY_SCHEDULE: u8 = 3;

/// The variant of trigger a [`TriggerExecutionRequest`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerVariant {
    /// Fired by an inbound HTTP request.
    Webhook,
    /// Fired by the cron scheduler.
    Schedule,
    /// Fired by an explicit manual invocation.
    Manual,
    /// Fired by another workflow calling this one as a sub-workflow.
    WorkflowCalled,
}

/// A trigger firing, normalized to the shape the Trigger Manager admits
/// (spec §2 data flow: "external event -> TriggerExecutionRequest").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerExecutionRequest {
    /// The trigger that fired.
    pub trigger_id: TriggerId,
    /// The workflow owning the trigger.
    pub workflow_id: WorkflowId,
    /// The node execution starts from.
    pub node_id: NodeId,
    /// Which kind of trigger produced this request.
    pub variant: TriggerVariant,
    /// Admission priority; `1` is highest (spec §4.3).
    pub priority: u8,
    /// The data handed to the starting node as `triggerData`.
    pub payload: serde_json::Value,
    /// Present only for webhook-originated requests.
    pub response_mode: Option<ResponseMode>,
    /// Test-observability mode (`?test=true`); does not alter execution
    /// semantics, only emits an additional event (spec §6).
    pub test_mode: bool,
}

/// Acknowledgement returned immediately once a request is admitted or
/// queued (spec §4.3 admission algorithm, step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAck {
    /// Whether the request was admitted (`true`) or queued (`false`).
    pub success: bool,
    /// The execution id assigned on admission.
    pub execution_id: ExecutionId,
    /// `"started"` or `"queued"`.
    pub status: String,
}

/// An HTTP response shaped by the `_httpResponse`-flagged item convention
/// (spec §4.1 response mode `last-node`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponseSpec {
    /// Status code the flagged item requested.
    pub status_code: u16,
    /// Extra headers the flagged item requested.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: serde_json::Value,
    /// Cookies the flagged item requested, as raw `Set-Cookie` values.
    pub cookies: Vec<String>,
}

/// What a completed execution handed back to the webhook layer, already
/// reduced to the pieces `last-node` response mode needs (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExecutionResult {
    /// The execution's terminal status, as a lowercase tag
    /// (`"completed"`, `"partial"`, `"failed"`, `"cancelled"`).
    pub status: String,
    /// Present if some node's `main` output carried `_httpResponse: true`.
    pub http_response: Option<HttpResponseSpec>,
    /// The last-executed node's first `main` item, the `last-node`
    /// fallback when no item carried `_httpResponse`.
    pub last_node_item: Option<serde_json::Value>,
}

/// Collaborator boundary: hands a [`TriggerExecutionRequest`] off to
/// whatever admits, queues, and executes it (the Trigger Manager, spec
/// §4.3), and polls the Result Cache (spec §4.5) for synchronous replies.
///
/// `nebula-webhook` only builds requests and shapes HTTP responses; it has
/// no idea how admission, queueing, or execution actually work. A
/// concrete implementation is wired in by `nebula-api`.
#[async_trait]
pub trait TriggerDispatcher: Send + Sync {
    /// Admit or queue a trigger firing.
    async fn dispatch(&self, request: TriggerExecutionRequest) -> Result<DispatchAck, WebhookError>;

    /// Block up to `timeout` for the named execution's result to appear in
    /// the Result Cache, polling at an interval of the implementation's
    /// choosing (spec §4.5: `<=100ms`).
    async fn wait_for_result(
        &self,
        execution_id: ExecutionId,
        timeout: Duration,
    ) -> Option<CachedExecutionResult>;
}
