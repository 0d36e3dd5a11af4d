//! The `CredentialResolver` collaborator boundary (spec §6): resolves an
//! opaque credential reference into the secret material a node needs.
//! Storage, encryption, and rotation all live behind this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Errors resolving a credential reference.
#[derive(Debug, Error, Clone)]
pub enum CredentialError {
    /// No [`CredentialResolver`] was configured on the engine.
    #[error("no credential resolver configured")]
    NoResolverConfigured,
    /// The referenced credential does not exist.
    #[error("credential not found: {0}")]
    NotFound(String),
    /// The resolver failed for a reason specific to its backend.
    #[error("credential resolution failed: {0}")]
    Backend(String),
}

/// Resolves opaque credential ids (as referenced by
/// [`nebula_workflow::NodeSettings::credentials`] and
/// [`nebula_workflow::WebhookAuth::Credential`]) into usable values.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve a credential id into its stored value.
    async fn resolve(&self, credential_id: &str) -> Result<serde_json::Value, CredentialError>;
}

/// A resolver backed by a fixed in-memory map, for tests and demos.
pub struct StaticCredentialResolver {
    values: std::collections::HashMap<String, serde_json::Value>,
}

impl StaticCredentialResolver {
    /// Build a resolver from a fixed set of credential id -> value pairs.
    #[must_use]
    pub fn new(values: std::collections::HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, credential_id: &str) -> Result<serde_json::Value, CredentialError> {
        self.values
            .get(credential_id)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(credential_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_returns_configured_value() {
        let mut values = std::collections::HashMap::new();
        values.insert("api-key".to_string(), serde_json::json!({"key": "abc"}));
        let resolver = StaticCredentialResolver::new(values);

        let resolved = resolver.resolve("api-key").await.unwrap();
        assert_eq!(resolved["key"], "abc");
    }

    #[tokio::test]
    async fn static_resolver_reports_missing_credential() {
        let resolver = StaticCredentialResolver::new(std::collections::HashMap::new());
        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound(_)));
    }
}
