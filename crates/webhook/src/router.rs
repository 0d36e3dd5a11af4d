//! The webhook ingress HTTP surface: resolves a request against the
//! [`WebhookRegistry`], runs the access-control chain (spec §4.1), and
//! shapes the HTTP reply according to the trigger's response mode.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Multipart, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use nebula_core::TriggerId;
use nebula_engine::CredentialResolver;
use nebula_eventbus::ExecutionEvent;
use nebula_telemetry::TelemetryService;
use nebula_workflow::{HttpMethod, ResponseMode};

use crate::auth::check_auth;
use crate::bot::is_bot;
use crate::cors::origin_allowed;
use crate::error::WebhookError;
use crate::ipfilter::ip_allowed;
use crate::limits::WebhookLimits;
use crate::multipart::read_multipart;
use crate::registry::WebhookRegistry;
use crate::request::{IncomingRequest, TriggerExecutionRequest, TriggerVariant, PRIORITY_WEBHOOK};
use crate::request::TriggerDispatcher;

/// Synchronous `last-node` response mode blocks for up to this long
/// (spec §4.1).
const LAST_NODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for the webhook ingress router.
pub struct WebhookRouterState {
    /// The live table of registered webhook triggers.
    pub registry: Arc<WebhookRegistry>,
    /// Where resolved requests are handed off for admission and execution.
    pub dispatcher: Arc<dyn TriggerDispatcher>,
    /// Credential resolver for `Credential`-mode authentication.
    pub credentials: Option<Arc<dyn CredentialResolver>>,
    /// Multipart size limits.
    pub limits: WebhookLimits,
    /// Telemetry facade, used to emit `webhook-test-triggered`.
    pub telemetry: Arc<dyn TelemetryService>,
}

/// Build the axum router mounting `/webhook/*path` and
/// `/webhook/testing/*path` (spec §6).
#[must_use]
pub fn build_router(state: Arc<WebhookRouterState>) -> Router {
    Router::new()
        .route("/webhook/{*path}", any(handle_live))
        .route("/webhook/testing/{*path}", any(handle_testing))
        .with_state(state)
}

async fn handle_live(State(state): State<Arc<WebhookRouterState>>, req: Request) -> Response {
    handle(state, req, false).await
}

async fn handle_testing(State(state): State<Arc<WebhookRouterState>>, req: Request) -> Response {
    handle(state, req, true).await
}

async fn handle(state: Arc<WebhookRouterState>, req: Request, test_mode: bool) -> Response {
    match handle_inner(&state, req, test_mode).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

async fn handle_inner(
    state: &Arc<WebhookRouterState>,
    req: Request,
    route_test_mode: bool,
) -> Result<Response, WebhookError> {
    let method = http_method(req.method())?;
    let uri = req.uri().clone();
    let path = strip_mount_prefix(uri.path(), route_test_mode);
    let headers = req.headers().clone();
    let query: std::collections::HashMap<String, String> = uri
        .query()
        .map(|q| {
            url_decode_query(q)
        })
        .unwrap_or_default();
    let client_ip = client_ip(&headers, req.extensions().get::<ConnectInfo<SocketAddr>>());
    let user_agent = header_value(&headers, "user-agent");
    let is_multipart = header_value(&headers, "content-type")
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    let test_mode = route_test_mode || query.get("test").is_some_and(|v| v == "true");

    let resolved = state
        .registry
        .resolve(&path)
        .ok_or(WebhookError::NotFound)?;
    let settings = resolved.webhook.settings.clone();

    // Step 1: method.
    if settings.method != method {
        return Err(WebhookError::MethodNotAllowed {
            expected: settings.method.to_string(),
        });
    }

    let (json_body, raw_body, files) = if is_multipart {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| WebhookError::Internal(e.to_string()))?;
        let parsed = read_multipart(multipart, &state.limits).await?;
        (
            Some(serde_json::Value::Object(parsed.fields)),
            Vec::new(),
            parsed.files,
        )
    } else {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| WebhookError::Internal(e.to_string()))?;
        let json = if settings.options.raw_body {
            None
        } else {
            serde_json::from_slice::<serde_json::Value>(&bytes).ok()
        };
        (json, bytes.to_vec(), std::collections::HashMap::new())
    };

    let incoming = IncomingRequest {
        method,
        path: path.clone(),
        headers: normalize_headers(&headers),
        query: query.clone(),
        json_body: json_body.clone(),
        raw_body: raw_body.clone(),
        files: files.clone(),
        client_ip,
        user_agent: user_agent.clone(),
        test_mode,
    };

    // Step 2: authentication.
    check_auth(&settings.auth, &incoming, state.credentials.as_deref()).await?;

    // Step 3: CORS origin.
    let origin = header_value(&headers, "origin");
    if !origin_allowed(origin.as_deref(), &settings.options.allowed_origins) {
        return Err(WebhookError::Forbidden("origin not allowed".into()));
    }

    // Step 4: IP allowlist.
    if let Some(ip) = client_ip {
        if !ip_allowed(ip, &settings.options.ip_whitelist) {
            return Err(WebhookError::Forbidden("ip address not allowed".into()));
        }
    }

    // Step 5: bot filter.
    if settings.options.ignore_bots && is_bot(user_agent.as_deref()) {
        return Err(WebhookError::Forbidden("request blocked by bot filter".into()));
    }

    if test_mode {
        state.telemetry.event_bus().emit(ExecutionEvent::WebhookTestTriggered {
            trigger_id: resolved.webhook.trigger_id,
            workflow_id: resolved.webhook.workflow_id,
        });
    }

    let payload = build_payload(&incoming, &resolved.params, &settings.options.property_name);

    let request = TriggerExecutionRequest {
        trigger_id: resolved.webhook.trigger_id,
        workflow_id: resolved.webhook.workflow_id,
        node_id: resolved.webhook.node_id,
        variant: TriggerVariant::Webhook,
        priority: PRIORITY_WEBHOOK,
        payload,
        response_mode: Some(settings.response_mode),
        test_mode,
    };

    let ack = state.dispatcher.dispatch(request).await?;

    match settings.response_mode {
        ResponseMode::Immediate => Ok(immediate_response(ack, &settings.options)),
        ResponseMode::LastNode => {
            last_node_response(state, resolved.webhook.trigger_id, ack, &settings.options).await
        }
    }
}

fn immediate_response(
    ack: crate::request::DispatchAck,
    options: &nebula_workflow::WebhookOptions,
) -> Response {
    if options.no_response_body {
        return StatusCode::ACCEPTED.into_response();
    }
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "executionId": ack.execution_id,
            "status": ack.status,
        })),
    )
        .into_response()
}

async fn last_node_response(
    state: &WebhookRouterState,
    _trigger_id: TriggerId,
    ack: crate::request::DispatchAck,
    options: &nebula_workflow::WebhookOptions,
) -> Result<Response, WebhookError> {
    let result = state
        .dispatcher
        .wait_for_result(ack.execution_id, LAST_NODE_TIMEOUT)
        .await
        .ok_or(WebhookError::GatewayTimeout)?;

    if options.no_response_body {
        let status = result
            .http_response
            .as_ref()
            .and_then(|r| StatusCode::from_u16(r.status_code).ok())
            .unwrap_or(StatusCode::OK);
        return Ok(status.into_response());
    }

    if let Some(http_response) = result.http_response {
        let status = StatusCode::from_u16(http_response.status_code).unwrap_or(StatusCode::OK);
        let mut response = (status, Json(http_response.body)).into_response();
        let response_headers = response.headers_mut();
        for (name, value) in http_response.headers {
            if let (Ok(name), Ok(value)) = (
                axum::http::HeaderName::try_from(name),
                axum::http::HeaderValue::try_from(value),
            ) {
                response_headers.insert(name, value);
            }
        }
        for cookie in http_response.cookies {
            if let Ok(value) = axum::http::HeaderValue::try_from(cookie) {
                response_headers.append(axum::http::header::SET_COOKIE, value);
            }
        }
        return Ok(response);
    }

    let body = result.last_node_item.unwrap_or(serde_json::Value::Null);
    Ok((StatusCode::OK, Json(body)).into_response())
}

fn build_payload(
    req: &IncomingRequest,
    params: &std::collections::HashMap<String, String>,
    property_name: &str,
) -> serde_json::Value {
    let body_value = req
        .json_body
        .clone()
        .unwrap_or_else(|| serde_json::Value::String(String::from_utf8_lossy(&req.raw_body).to_string()));

    let mut object = serde_json::Map::new();
    object.insert(property_name.to_string(), body_value);
    object.insert("params".into(), serde_json::to_value(params).unwrap_or_default());
    object.insert("query".into(), serde_json::to_value(&req.query).unwrap_or_default());
    object.insert("headers".into(), serde_json::to_value(&req.headers).unwrap_or_default());
    if !req.files.is_empty() {
        object.insert("files".into(), serde_json::to_value(&req.files).unwrap_or_default());
    }
    serde_json::Value::Object(object)
}

fn http_method(method: &axum::http::Method) -> Result<HttpMethod, WebhookError> {
    match method.as_str() {
        "GET" => Ok(HttpMethod::Get),
        "POST" => Ok(HttpMethod::Post),
        "PUT" => Ok(HttpMethod::Put),
        "DELETE" => Ok(HttpMethod::Delete),
        "PATCH" => Ok(HttpMethod::Patch),
        other => Err(WebhookError::MethodNotAllowed {
            expected: other.to_string(),
        }),
    }
}

fn strip_mount_prefix(path: &str, test_mode: bool) -> String {
    let prefix = if test_mode { "/webhook/testing/" } else { "/webhook/" };
    path.strip_prefix(prefix).unwrap_or(path).trim_matches('/').to_string()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}

fn normalize_headers(headers: &HeaderMap) -> std::collections::HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<std::net::IpAddr> {
    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }
    connect_info.map(|ConnectInfo(addr)| addr.ip())
}

fn url_decode_query(query: &str) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        map.insert(percent_decode(key), percent_decode(value));
    }
    map
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
                out.push(bytes[i]);
                i += 1;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mount_prefix_live() {
        assert_eq!(strip_mount_prefix("/webhook/users/42", false), "users/42");
    }

    #[test]
    fn strip_mount_prefix_testing() {
        assert_eq!(strip_mount_prefix("/webhook/testing/users/42", true), "users/42");
    }

    #[test]
    fn percent_decode_handles_spaces_and_escapes() {
        assert_eq!(percent_decode("a+b%20c"), "a b c");
    }

    #[test]
    fn url_decode_query_parses_pairs() {
        let map = url_decode_query("a=1&b=two%20words");
        assert_eq!(map.get("a"), Some(&"1".to_string()));
        assert_eq!(map.get("b"), Some(&"two words".to_string()));
    }
}
