//! Minimal `tracing`-based logging init shared by every Nebula binary.
//!
//! This is the ambient logging layer: every binary crate in the workspace
//! calls [`init`] once, at startup, before doing anything else.

use tracing_subscriber::EnvFilter;

/// Default filter directive used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the global `tracing` subscriber.
///
/// Reads `RUST_LOG` for the filter, falling back to [`DEFAULT_FILTER`].
/// Output is human-readable text on stdout with target and line number.
///
/// Calling this more than once in the same process returns an error from
/// the underlying `tracing` global dispatcher and is silently ignored —
/// tests that each initialize their own subscriber should use
/// [`try_init`] instead.
pub fn init() {
    let _ = try_init();
}

/// Like [`init`], but reports whether a subscriber was already installed
/// instead of swallowing the error.
///
/// # Errors
/// Returns the underlying `tracing_subscriber` error if a global
/// subscriber has already been set.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init()
}
