//! Authentication checks for the access-control chain (spec §4.1 step 2).

use base64::Engine as _;
use nebula_engine::CredentialResolver;
use nebula_workflow::WebhookAuth;

use crate::error::WebhookError;
use crate::request::IncomingRequest;

/// Validate `req` against a webhook trigger's configured authentication
/// mode.
///
/// # Errors
/// Returns [`WebhookError::Unauthorized`] on any mismatch or resolution
/// failure.
pub async fn check_auth(
    auth: &WebhookAuth,
    req: &IncomingRequest,
    credentials: Option<&dyn CredentialResolver>,
) -> Result<(), WebhookError> {
    match auth {
        WebhookAuth::None => Ok(()),
        WebhookAuth::Basic { username, password } => check_basic(req, username, password),
        WebhookAuth::Header { name, value } => check_header(req, name, value),
        WebhookAuth::Query { name, value } => check_query(req, name, value),
        WebhookAuth::Credential { credential_id } => {
            check_credential(req, credential_id, credentials).await
        }
    }
}

fn check_basic(req: &IncomingRequest, username: &str, password: &str) -> Result<(), WebhookError> {
    let header = req.header("authorization").ok_or(WebhookError::Unauthorized)?;
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(WebhookError::Unauthorized)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| WebhookError::Unauthorized)?;
    let decoded = String::from_utf8(decoded).map_err(|_| WebhookError::Unauthorized)?;
    let (user, pass) = decoded.split_once(':').ok_or(WebhookError::Unauthorized)?;

    if user == username && pass == password {
        Ok(())
    } else {
        Err(WebhookError::Unauthorized)
    }
}

fn check_header(req: &IncomingRequest, name: &str, expected: &str) -> Result<(), WebhookError> {
    match req.header(name) {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(WebhookError::Unauthorized),
    }
}

fn check_query(req: &IncomingRequest, name: &str, expected: &str) -> Result<(), WebhookError> {
    match req.query.get(name) {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(WebhookError::Unauthorized),
    }
}

async fn check_credential(
    req: &IncomingRequest,
    credential_id: &str,
    credentials: Option<&dyn CredentialResolver>,
) -> Result<(), WebhookError> {
    let resolver = credentials.ok_or(WebhookError::Unauthorized)?;
    let secret = resolver
        .resolve(credential_id)
        .await
        .map_err(|_| WebhookError::Unauthorized)?;

    if let (Some(user), Some(pass)) = (secret.get("username"), secret.get("password")) {
        if let (Some(user), Some(pass)) = (user.as_str(), pass.as_str()) {
            return check_basic(req, user, pass);
        }
    }
    if let (Some(name), Some(value)) = (secret.get("header"), secret.get("value")) {
        if let (Some(name), Some(value)) = (name.as_str(), value.as_str()) {
            return check_header(req, name, value);
        }
    }
    if let Some(token) = secret.get("token").and_then(|t| t.as_str()) {
        let expected = format!("Bearer {token}");
        return match req.header("authorization") {
            Some(actual) if actual == expected => Ok(()),
            _ => Err(WebhookError::Unauthorized),
        };
    }

    Err(WebhookError::Unauthorized)
}
