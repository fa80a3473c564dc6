//! Axum middleware settings applied to the router.
//!
//! Includes request tracing, timeout enforcement, and a body size cap.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest request body accepted. Envelopes are a few KiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
