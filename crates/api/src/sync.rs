//! The Workflow Sync Facade (spec §4.7 / §2): the single entry point that
//! reconciles a saved [`Workflow`]'s triggers against the webhook registry
//! and the Schedule Manager, so neither one ever observes a workflow save
//! directly.

use std::sync::Arc;

use nebula_core::WorkflowId;
use nebula_webhook::WebhookRegistry;
use nebula_workflow::{TriggerDefinition, Workflow};

use crate::error::ApiError;
use crate::schedule::ScheduleManager;

/// Reconciles webhook registration and cron scheduling whenever a
/// workflow is saved, activated, deactivated, or deleted.
pub struct WorkflowSyncFacade {
    webhooks: Arc<WebhookRegistry>,
    schedules: Arc<ScheduleManager>,
}

impl WorkflowSyncFacade {
    /// Build a facade around the two trigger-kind collaborators it
    /// reconciles.
    #[must_use]
    pub fn new(webhooks: Arc<WebhookRegistry>, schedules: Arc<ScheduleManager>) -> Self {
        Self { webhooks, schedules }
    }

    /// Reconcile both collaborators against a just-saved workflow: gone
    /// triggers are removed, current ones are (re-)registered, and an
    /// inactive workflow has every trigger disabled/removed without
    /// forgetting its settings (spec §4.2 durability protocol, §4.1
    /// registry semantics).
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidCron`] if a schedule trigger's cron
    /// expression fails validation.
    pub fn on_workflow_saved(&self, workflow: &Workflow) -> Result<(), ApiError> {
        self.sync_webhooks(workflow);
        self.schedules.sync_workflow(workflow)?;
        Ok(())
    }

    /// Remove every trigger this workflow ever registered, for a hard
    /// delete (not merely deactivation).
    pub fn on_workflow_deleted(&self, workflow_id: WorkflowId) {
        for trigger_id in self.webhooks.triggers_for_workflow(workflow_id) {
            self.webhooks.unregister(trigger_id);
        }
        for job in self.schedules.jobs() {
            if job.workflow_id == workflow_id {
                self.schedules.unregister(workflow_id, job.trigger_id);
            }
        }
    }

    /// Flip every trigger's enabled state to match the workflow's `active`
    /// flag, without touching registered settings. Cheaper than a full
    /// [`Self::on_workflow_saved`] when only activation state changed.
    pub fn on_workflow_activation_changed(&self, workflow: &Workflow) -> Result<(), ApiError> {
        self.webhooks.set_workflow_enabled(workflow.id, workflow.active);
        if workflow.active {
            self.schedules.sync_workflow(workflow)?;
        } else {
            for job in self.schedules.jobs() {
                if job.workflow_id == workflow.id {
                    self.schedules.unregister(workflow.id, job.trigger_id);
                }
            }
        }
        Ok(())
    }

    fn sync_webhooks(&self, workflow: &Workflow) {
        let current_webhook_ids: std::collections::HashSet<_> = workflow
            .triggers
            .iter()
            .filter_map(|trigger| match trigger {
                TriggerDefinition::Webhook { id, .. } => Some(*id),
                _ => None,
            })
            .collect();

        for trigger_id in self.webhooks.triggers_for_workflow(workflow.id) {
            if !current_webhook_ids.contains(&trigger_id) {
                self.webhooks.unregister(trigger_id);
            }
        }

        for trigger in &workflow.triggers {
            if let TriggerDefinition::Webhook { id, node_id, active, settings } = trigger {
                self.webhooks.register(*id, workflow.id, *node_id, settings.clone(), *active && workflow.active);
            }
        }
    }
}
