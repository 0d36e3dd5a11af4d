//! Default size limits for multipart/file-upload bodies (spec §6).

/// Limits enforced while parsing a multipart webhook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookLimits {
    /// Maximum size of a single uploaded file, in bytes.
    pub max_file_bytes: usize,
    /// Maximum number of file parts in one request.
    pub max_files: usize,
    /// Maximum number of non-file fields in one request.
    pub max_fields: usize,
}

impl Default for WebhookLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            max_files: 20,
            max_fields: 50,
        }
    }
}
