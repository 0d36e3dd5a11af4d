//! Multipart body handling: uploaded files are base64-encoded into the
//! `{data, mimeType, fileName, fileSize}` shape spec §6 describes; other
//! fields are collected into a plain JSON object.

use std::collections::HashMap;

use axum::extract::Multipart;
use base64::Engine as _;

use crate::error::WebhookError;
use crate::limits::WebhookLimits;
use crate::request::BinaryEntry;

/// The result of draining a multipart body.
#[derive(Debug, Default)]
pub struct MultipartBody {
    /// Non-file fields, keyed by field name.
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// File fields, keyed by field name, base64-encoded.
    pub files: HashMap<String, BinaryEntry>,
}

/// Drain a multipart body, enforcing `limits`.
///
/// # Errors
/// Returns [`WebhookError::Rejected`] if any limit is exceeded, or
/// [`WebhookError::Internal`] if the multipart stream itself is malformed.
pub async fn read_multipart(
    mut multipart: Multipart,
    limits: &WebhookLimits,
) -> Result<MultipartBody, WebhookError> {
    let mut body = MultipartBody::default();
    let mut field_count = 0usize;
    let mut file_count = 0usize;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| WebhookError::Internal(format!("malformed multipart body: {e}")))?;
        let Some(field) = field else { break };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let mime_type = field.content_type().map(str::to_string);

        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebhookError::Internal(format!("malformed multipart field: {e}")))?;

        if let Some(file_name) = file_name {
            file_count += 1;
            if file_count > limits.max_files {
                return Err(WebhookError::Rejected(format!(
                    "too many files, limit is {}",
                    limits.max_files
                )));
            }
            if bytes.len() > limits.max_file_bytes {
                return Err(WebhookError::Rejected(format!(
                    "file {name} exceeds the {}-byte limit",
                    limits.max_file_bytes
                )));
            }
            body.files.insert(
                name,
                BinaryEntry {
                    data: base64::engine::general_purpose::STANDARD.encode(&bytes),
                    mime_type: mime_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                    file_name,
                    file_size: bytes.len(),
                },
            );
        } else {
            field_count += 1;
            if field_count > limits.max_fields {
                return Err(WebhookError::Rejected(format!(
                    "too many fields, limit is {}",
                    limits.max_fields
                )));
            }
            let value = String::from_utf8_lossy(&bytes).to_string();
            body.fields.insert(name, serde_json::Value::String(value));
        }
    }

    Ok(body)
}
