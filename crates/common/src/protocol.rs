//! Wire types exchanged with the messaging platform and with probes.
//!
//! The inbound envelope is not modelled as a struct: its field names vary
//! between platform revisions and are resolved by the codec's alias table.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Encrypted reply
// ---------------------------------------------------------------------------

/// Inner JSON object of the `envelope` reply framing.
///
/// All three fields are standard base64. The object itself is serialised and
/// base64-encoded once more before it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Fresh 12-byte GCM nonce.
    pub iv: String,
    /// AES-GCM ciphertext without the tag.
    pub ciphertext: String,
    /// 16-byte GCM authentication tag.
    pub tag: String,
}

// ---------------------------------------------------------------------------
// Cleartext replies
// ---------------------------------------------------------------------------

/// Status reported to liveness probes and health checks.
pub const STATUS_ACTIVE: &str = "active";

/// `{"data":{"status":"active"}}`, the reply to every health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub data: StatusData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusData {
    pub status: String,
}

impl StatusReply {
    /// The fixed "active" reply.
    pub fn active() -> Self {
        Self {
            data: StatusData {
                status: STATUS_ACTIVE.into(),
            },
        }
    }
}

/// Protocol version written into screen replies.
pub const SCREEN_REPLY_VERSION: &str = "3.0";

/// Navigation reply sent after a form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenReply {
    pub version: String,
    pub screen: String,
    pub data: serde_json::Value,
}

impl ScreenReply {
    /// Reply that moves the client to `screen` with `{"ok":true}` as data.
    pub fn success(screen: impl Into<String>) -> Self {
        Self {
            version: SCREEN_REPLY_VERSION.into(),
            screen: screen.into(),
            data: serde_json::json!({ "ok": true }),
        }
    }
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"malformed_envelope"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Crate version of the running binary.
    pub version: String,
}
