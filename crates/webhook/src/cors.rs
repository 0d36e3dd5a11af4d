//! CORS origin allowlisting (spec §4.1 step 3), including wildcard
//! subdomains (`*.example.com`).

/// Check `origin` against a comma-separated allowlist.
///
/// An unset or `*` allowlist permits any origin (including none). Each
/// entry is either matched verbatim against the full `Origin` header value,
/// or, if it begins with `*.`, matched against the origin's host as a
/// suffix (the apex domain itself also matches).
#[must_use]
pub fn origin_allowed(origin: Option<&str>, allowed_origins: &Option<String>) -> bool {
    let Some(allowed) = allowed_origins else {
        return true;
    };
    let allowed = allowed.trim();
    if allowed.is_empty() || allowed == "*" {
        return true;
    }

    let Some(origin) = origin else {
        return false;
    };

    allowed.split(',').map(str::trim).any(|entry| {
        if let Some(suffix) = entry.strip_prefix("*.") {
            origin_host(origin).is_some_and(|host| host == suffix || host.ends_with(&format!(".{suffix}")))
        } else {
            entry == origin
        }
    })
}

/// Extract the host portion of an `Origin` header value
/// (`scheme://host[:port]`), dropping the scheme and any port.
fn origin_host(origin: &str) -> Option<&str> {
    let without_scheme = origin.split("://").next_back()?;
    let host = without_scheme.split(['/', ':']).next()?;
    if host.is_empty() { None } else { Some(host) }
}
