//! The Trigger Registry: the in-memory table of active webhook triggers
//! the router resolves inbound paths against (spec §4.1).

use dashmap::DashMap;
use nebula_core::{NodeId, TriggerId, WorkflowId};
use nebula_workflow::WebhookSettings;

use crate::pattern::match_pattern;

/// One registered webhook trigger.
#[derive(Debug, Clone)]
pub struct RegisteredWebhook {
    /// The trigger's identifier.
    pub trigger_id: TriggerId,
    /// The owning workflow.
    pub workflow_id: WorkflowId,
    /// The node execution starts from.
    pub node_id: NodeId,
    /// The trigger's webhook settings (method, pattern, auth, options).
    pub settings: WebhookSettings,
    /// `false` if the trigger itself or its owning workflow is inactive;
    /// inactive entries are kept (so re-activation doesn't need a full
    /// re-registration) but never match an inbound request.
    pub enabled: bool,
}

/// A resolved match: the registered trigger plus any `:name` captures.
#[derive(Debug, Clone)]
pub struct ResolvedWebhook {
    /// The matched trigger.
    pub webhook: RegisteredWebhook,
    /// Captured path parameters.
    pub params: std::collections::HashMap<String, String>,
}

/// The live table of registered webhook triggers.
///
/// Populated and kept in sync by the Workflow Sync Facade (spec §4.7) as
/// workflows are saved, activated, or deleted.
#[derive(Debug, Default)]
pub struct WebhookRegistry {
    entries: DashMap<TriggerId, RegisteredWebhook>,
}

impl WebhookRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a webhook trigger.
    pub fn register(
        &self,
        trigger_id: TriggerId,
        workflow_id: WorkflowId,
        node_id: NodeId,
        settings: WebhookSettings,
        enabled: bool,
    ) {
        self.entries.insert(
            trigger_id,
            RegisteredWebhook {
                trigger_id,
                workflow_id,
                node_id,
                settings,
                enabled,
            },
        );
    }

    /// Remove a trigger entirely.
    pub fn unregister(&self, trigger_id: TriggerId) {
        self.entries.remove(&trigger_id);
    }

    /// Flip whether an already-registered trigger's requests are accepted,
    /// without discarding its settings (used when a workflow is
    /// deactivated rather than deleted).
    pub fn set_enabled(&self, trigger_id: TriggerId, enabled: bool) {
        if let Some(mut entry) = self.entries.get_mut(&trigger_id) {
            entry.enabled = enabled;
        }
    }

    /// Enable or disable every trigger belonging to a workflow, e.g. when
    /// the workflow's own `active` flag changes.
    pub fn set_workflow_enabled(&self, workflow_id: WorkflowId, enabled: bool) {
        for mut entry in self.entries.iter_mut() {
            if entry.workflow_id == workflow_id {
                entry.enabled = enabled;
            }
        }
    }

    /// All triggers currently registered for a workflow.
    #[must_use]
    pub fn triggers_for_workflow(&self, workflow_id: WorkflowId) -> Vec<TriggerId> {
        self.entries
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .map(|e| e.trigger_id)
            .collect()
    }

    /// Resolve an inbound path against every enabled, path-matching
    /// trigger. The first match (in arbitrary but stable iteration order)
    /// is returned for dispatch; the rest are left unused, matching spec
    /// §4.1's "first match wins, remainder logged".
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<ResolvedWebhook> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .find_map(|entry| {
                let params = match_pattern(&entry.settings.pattern(), path)?;
                Some(ResolvedWebhook {
                    webhook: entry.clone(),
                    params,
                })
            })
    }

    /// Number of currently registered triggers, enabled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no triggers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_workflow::{HttpMethod, ResponseMode, WebhookAuth, WebhookOptions};

    fn settings(pattern: &str) -> WebhookSettings {
        WebhookSettings {
            method: HttpMethod::Get,
            uuid_segment: None,
            path_template: pattern.to_string(),
            auth: WebhookAuth::None,
            response_mode: ResponseMode::Immediate,
            options: WebhookOptions::default(),
        }
    }

    #[test]
    fn resolves_matching_path() {
        let registry = WebhookRegistry::new();
        let trigger_id = TriggerId::v4();
        registry.register(
            trigger_id,
            WorkflowId::v4(),
            NodeId::v4(),
            settings("users/:userId"),
            true,
        );

        let resolved = registry.resolve("users/42").unwrap();
        assert_eq!(resolved.webhook.trigger_id, trigger_id);
        assert_eq!(resolved.params.get("userId"), Some(&"42".to_string()));
    }

    #[test]
    fn disabled_trigger_does_not_match() {
        let registry = WebhookRegistry::new();
        registry.register(
            TriggerId::v4(),
            WorkflowId::v4(),
            NodeId::v4(),
            settings("hooks/payment"),
            false,
        );
        assert!(registry.resolve("hooks/payment").is_none());
    }

    #[test]
    fn set_workflow_enabled_toggles_all_its_triggers() {
        let registry = WebhookRegistry::new();
        let workflow_id = WorkflowId::v4();
        registry.register(
            TriggerId::v4(),
            workflow_id,
            NodeId::v4(),
            settings("a"),
            true,
        );
        registry.register(
            TriggerId::v4(),
            workflow_id,
            NodeId::v4(),
            settings("b"),
            true,
        );

        registry.set_workflow_enabled(workflow_id, false);
        assert!(registry.resolve("a").is_none());
        assert!(registry.resolve("b").is_none());

        registry.set_workflow_enabled(workflow_id, true);
        assert!(registry.resolve("a").is_some());
    }

    #[test]
    fn unregister_removes_trigger() {
        let registry = WebhookRegistry::new();
        let trigger_id = TriggerId::v4();
        registry.register(trigger_id, WorkflowId::v4(), NodeId::v4(), settings("x"), true);
        registry.unregister(trigger_id);
        assert!(registry.resolve("x").is_none());
        assert!(registry.is_empty());
    }
}
