//! Trigger definitions — the webhook/schedule/manual/workflow-called entry
//! points a workflow declares.

use nebula_core::{NodeId, TriggerId};
use serde::{Deserialize, Serialize};

/// HTTP authentication mode for a webhook trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookAuth {
    /// No authentication required.
    None,
    /// HTTP Basic authentication against configured credentials.
    Basic {
        /// Expected username.
        username: String,
        /// Expected password.
        password: String,
    },
    /// A named header must equal an expected value.
    Header {
        /// Header name to check.
        name: String,
        /// Expected value.
        value: String,
    },
    /// A named query parameter must equal an expected value.
    Query {
        /// Query parameter name to check.
        name: String,
        /// Expected value.
        value: String,
    },
    /// Resolve the expected value through the credential collaborator (§6).
    Credential {
        /// Opaque reference to a stored credential.
        credential_id: String,
    },
}

/// Whether a webhook replies immediately or waits for a designated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseMode {
    /// Acknowledge immediately with the execution id.
    Immediate,
    /// Block (up to 30s) for the result cache, then reply with the
    /// `_httpResponse`-flagged item or the last node's first item.
    LastNode,
}

/// Recognized webhook options (spec §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookOptions {
    /// CORS allowlist; `"*"` or unset permits any origin. Supports wildcard
    /// subdomains (`*.example.com`).
    #[serde(default)]
    pub allowed_origins: Option<String>,
    /// Property name under which uploaded binary data is exposed.
    #[serde(default = "default_binary_property")]
    pub binary_property: String,
    /// If true, requests whose `User-Agent` matches a known bot/crawler
    /// signature are rejected.
    #[serde(default)]
    pub ignore_bots: bool,
    /// Comma-separated IP/CIDR allowlist; empty means unrestricted.
    #[serde(default)]
    pub ip_whitelist: String,
    /// If true, the HTTP response body is empty regardless of response mode.
    #[serde(default)]
    pub no_response_body: bool,
    /// If true, the request body is exposed to the workflow unparsed.
    #[serde(default)]
    pub raw_body: bool,
    /// Response `Content-Type` family.
    #[serde(default)]
    pub response_content_type: ResponseContentType,
    /// Exact `Content-Type` value, used when `response_content_type` is
    /// `Custom`.
    #[serde(default)]
    pub custom_content_type: Option<String>,
    /// Extra headers to attach to the response.
    #[serde(default)]
    pub response_headers: Vec<HeaderPair>,
    /// Root property name under which the parsed body is exposed.
    #[serde(default = "default_property_name")]
    pub property_name: String,
}

fn default_binary_property() -> String {
    "binary".to_string()
}

fn default_property_name() -> String {
    "body".to_string()
}

/// A single name/value header pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderPair {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// The response `Content-Type` family for a webhook reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseContentType {
    /// `application/json` (default).
    #[default]
    Json,
    /// Caller-supplied exact content type (see `custom_content_type`).
    Custom,
    /// `text/plain`.
    Text,
}

/// High-level schedule authoring mode; all variants normalize to a 5-field
/// cron expression at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheduleMode", rename_all = "snake_case")]
pub enum ScheduleMode {
    /// A plain 5-field cron expression, authored directly.
    Cron {
        /// The cron expression.
        expression: String,
    },
    /// A simple recurring interval (e.g. every N minutes/hours).
    Simple {
        /// Interval unit.
        interval: SimpleInterval,
        /// How many units between firings.
        #[serde(default = "default_simple_every")]
        every: u32,
    },
    /// A single fixed point in time (fires once).
    Datetime {
        /// ISO-8601 timestamp.
        at: chrono::DateTime<chrono::Utc>,
    },
}

fn default_simple_every() -> u32 {
    1
}

/// Interval unit for [`ScheduleMode::Simple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleInterval {
    /// Every N minutes.
    Minute,
    /// Every N hours.
    Hour,
    /// Every N days.
    Day,
    /// Every N weeks.
    Week,
}

/// Schedule-trigger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// 5-field cron expression (minute, hour, day-of-month, month, day-of-week).
    pub cron_expression: String,
    /// IANA timezone name; defaults to UTC.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Human-readable description, not interpreted by the scheduler.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// HTTP methods a webhook trigger may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
        }
    }
}

/// Webhook-trigger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// HTTP method the trigger responds to.
    pub method: HttpMethod,
    /// Optional literal UUID path segment, joined ahead of `path_template`.
    #[serde(default)]
    pub uuid_segment: Option<String>,
    /// Path template; literal segments match exactly, `:name` segments
    /// capture into a parameter.
    pub path_template: String,
    /// Authentication mode.
    #[serde(default = "default_auth")]
    pub auth: WebhookAuth,
    /// Response mode.
    #[serde(default = "default_response_mode")]
    pub response_mode: ResponseMode,
    /// Recognized webhook options.
    #[serde(default)]
    pub options: WebhookOptions,
}

fn default_auth() -> WebhookAuth {
    WebhookAuth::None
}

fn default_response_mode() -> ResponseMode {
    ResponseMode::Immediate
}

impl WebhookSettings {
    /// The full matching pattern: `uuid_segment` joined with `path_template`.
    #[must_use]
    pub fn pattern(&self) -> String {
        match &self.uuid_segment {
            Some(seg) if !seg.is_empty() => format!("{seg}/{}", self.path_template),
            _ => self.path_template.clone(),
        }
    }
}

/// One trigger declared by a workflow: a named entry point mapped to a
/// starting node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum TriggerDefinition {
    /// Fires on a matching inbound HTTP request.
    Webhook {
        /// Unique identifier for this trigger.
        id: TriggerId,
        /// The node that starts execution when this trigger fires.
        node_id: NodeId,
        /// Whether the trigger is currently active.
        active: bool,
        /// Webhook-specific settings.
        settings: WebhookSettings,
    },
    /// Fires on a cron schedule.
    Schedule {
        /// Unique identifier for this trigger.
        id: TriggerId,
        /// The node that starts execution when this trigger fires.
        node_id: NodeId,
        /// Whether the trigger is currently active.
        active: bool,
        /// Schedule-specific settings.
        settings: ScheduleSettings,
    },
    /// Fires on an explicit manual invocation (editor "run" button, API call).
    Manual {
        /// Unique identifier for this trigger.
        id: TriggerId,
        /// The node that starts execution when this trigger fires.
        node_id: NodeId,
        /// Whether the trigger is currently active.
        active: bool,
    },
    /// Fires when another workflow invokes this one as a sub-workflow.
    WorkflowCalled {
        /// Unique identifier for this trigger.
        id: TriggerId,
        /// The node that starts execution when this trigger fires.
        node_id: NodeId,
        /// Whether the trigger is currently active.
        active: bool,
    },
}

impl TriggerDefinition {
    /// The trigger's identifier, regardless of variant.
    #[must_use]
    pub fn id(&self) -> TriggerId {
        match self {
            Self::Webhook { id, .. }
            | Self::Schedule { id, .. }
            | Self::Manual { id, .. }
            | Self::WorkflowCalled { id, .. } => *id,
        }
    }

    /// The node this trigger starts execution from.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::Webhook { node_id, .. }
            | Self::Schedule { node_id, .. }
            | Self::Manual { node_id, .. }
            | Self::WorkflowCalled { node_id, .. } => *node_id,
        }
    }

    /// Whether this trigger is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Self::Webhook { active, .. }
            | Self::Schedule { active, .. }
            | Self::Manual { active, .. }
            | Self::WorkflowCalled { active, .. } => *active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook_settings(template: &str) -> WebhookSettings {
        WebhookSettings {
            method: HttpMethod::Get,
            uuid_segment: None,
            path_template: template.to_string(),
            auth: WebhookAuth::None,
            response_mode: ResponseMode::Immediate,
            options: WebhookOptions::default(),
        }
    }

    #[test]
    fn webhook_pattern_without_uuid_segment() {
        let settings = webhook_settings("users/:userId");
        assert_eq!(settings.pattern(), "users/:userId");
    }

    #[test]
    fn webhook_pattern_with_uuid_segment() {
        let mut settings = webhook_settings("users/:userId");
        settings.uuid_segment = Some("550e8400-e29b-41d4-a716-446655440000".into());
        assert_eq!(
            settings.pattern(),
            "550e8400-e29b-41d4-a716-446655440000/users/:userId"
        );
    }

    #[test]
    fn trigger_definition_accessors() {
        let trigger = TriggerDefinition::Webhook {
            id: TriggerId::v4(),
            node_id: NodeId::v4(),
            active: true,
            settings: webhook_settings("hooks/payment"),
        };
        assert!(trigger.is_active());
    }

    #[test]
    fn webhook_options_defaults() {
        let options = WebhookOptions::default();
        assert_eq!(options.binary_property, "binary");
        assert_eq!(options.property_name, "body");
        assert!(!options.ignore_bots);
    }

    #[test]
    fn schedule_settings_default_timezone() {
        let json = serde_json::json!({"cron_expression": "* * * * *"});
        let settings: ScheduleSettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn serde_roundtrip_schedule_trigger() {
        let trigger = TriggerDefinition::Schedule {
            id: TriggerId::v4(),
            node_id: NodeId::v4(),
            active: true,
            settings: ScheduleSettings {
                cron_expression: "*/5 * * * *".into(),
                timezone: "UTC".into(),
                description: Some("every five minutes".into()),
            },
        };
        let json = serde_json::to_string(&trigger).unwrap();
        let back: TriggerDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trigger);
    }
}
