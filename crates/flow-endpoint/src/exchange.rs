//! Classification of decrypted payloads and construction of replies.

use common::protocol::{ScreenReply, StatusReply};
use serde_json::Value;

use crate::fields::{extract_form_fields, FormFields};

/// What a decrypted payload asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    /// Platform health check; answered with the "active" status.
    HealthCheck,
    /// Form submission with whatever fields could be extracted.
    Submission(FormFields),
}

/// Reply body for a [`FlowAction`].
#[derive(Debug, Clone, PartialEq)]
pub enum FlowReply {
    Status(StatusReply),
    Screen(ScreenReply),
}

impl FlowReply {
    /// JSON value of the reply, as it is encrypted or sent in clear.
    pub fn to_value(&self) -> Value {
        let value = match self {
            FlowReply::Status(reply) => serde_json::to_value(reply),
            FlowReply::Screen(reply) => serde_json::to_value(reply),
        };
        // Both reply types are plain structs of strings and JSON values.
        value.unwrap_or(Value::Null)
    }
}

/// Classify a decrypted payload.
///
/// A health check is an explicit `health_check` operation (`payload.op`,
/// `data.op`, or `op`), an `action` of `health_check` or `ping`, an `event`
/// or `type` of `HEALTH_CHECK`, or a payload with no operation, no `screen`,
/// and no `fields` or `data.fields`.
pub fn classify(cleartext: &Value) -> FlowAction {
    let op = ["payload", "data"]
        .iter()
        .filter_map(|k| cleartext.get(*k))
        .chain(std::iter::once(cleartext))
        .find_map(|v| v.get("op").filter(|op| !op.is_null()));

    let action = cleartext.get("action").and_then(Value::as_str);
    let is_health = op.and_then(Value::as_str) == Some("health_check")
        || matches!(action, Some("health_check" | "ping"))
        || cleartext.get("event").and_then(Value::as_str) == Some("HEALTH_CHECK")
        || cleartext.get("type").and_then(Value::as_str) == Some("HEALTH_CHECK")
        || (op.is_none()
            && cleartext.get("screen").is_none()
            && cleartext.get("fields").is_none()
            && cleartext.pointer("/data/fields").is_none());

    if is_health {
        FlowAction::HealthCheck
    } else {
        FlowAction::Submission(extract_form_fields(cleartext))
    }
}

/// Build the reply for `action`. Submissions navigate to `success_screen`.
pub fn reply_for(action: &FlowAction, success_screen: &str) -> FlowReply {
    match action {
        FlowAction::HealthCheck => FlowReply::Status(StatusReply::active()),
        FlowAction::Submission(_) => FlowReply::Screen(ScreenReply::success(success_screen)),
    }
}
