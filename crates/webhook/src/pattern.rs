//! Webhook path-pattern matching (spec §4.1).
//!
//! A pattern is a `/`-joined sequence of segments. A literal segment must
//! match exactly; a segment of the form `:name` captures the corresponding
//! path segment into a parameter named `name`. Patterns and paths are
//! compared with leading/trailing slashes trimmed, segment-for-segment —
//! there is no wildcard tail capture, so pattern and path must have the
//! same number of segments.

use std::collections::HashMap;

/// Attempt to match `path` against `pattern`, returning the captured
/// `:name` parameters on success.
#[must_use]
pub fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_segments: Vec<&str> = trimmed_segments(pattern);
    let path_segments: Vec<&str> = trimmed_segments(path);

    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (p, s) in pattern_segments.iter().zip(path_segments.iter()) {
        if let Some(name) = p.strip_prefix(':') {
            if name.is_empty() {
                return None;
            }
            params.insert(name.to_string(), (*s).to_string());
        } else if p != s {
            return None;
        }
    }

    Some(params)
}

fn trimmed_segments(s: &str) -> Vec<&str> {
    let trimmed = s.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}
