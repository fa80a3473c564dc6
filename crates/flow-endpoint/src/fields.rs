//! Best-effort flattening of submitted form fields.
//!
//! Clients place form answers in several shapes. Known locations are tried in
//! a fixed order and the first one that yields at least one field wins:
//!
//! 1. `data.fields`
//! 2. `data.service_form`
//! 3. `fields`
//! 4. `data`
//! 5. each `data.form_responses[].fields`
//!
//! A location matches if it is an array of field records, an object holding
//! such an array under `fields`, or a flat form object carrying a non-empty
//! [`FORM_MARKERS`] key. Field records are `{name|key|id, value}`,
//! `{name, selected_option: {id}}`, or `{name, values: [single]}`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Keys that mark a bare object as a flat form answer.
pub const FORM_MARKERS: [&str; 2] = ["full_name", "mobile"];

/// Flat `name → scalar` mapping of submitted fields.
pub type FormFields = BTreeMap<String, Value>;

/// Extract submitted fields from a decrypted payload. Empty if none match.
pub fn extract_form_fields(payload: &Value) -> FormFields {
    let data = payload.get("data");
    let roots = [
        data.and_then(|d| d.get("fields")),
        data.and_then(|d| d.get("service_form")),
        payload.get("fields"),
        data,
    ];

    for root in roots.into_iter().flatten() {
        let fields = fields_at(root);
        if !fields.is_empty() {
            return fields;
        }
    }

    let responses = data
        .and_then(|d| d.get("form_responses"))
        .and_then(Value::as_array);
    for response in responses.into_iter().flatten() {
        if let Some(records) = response.get("fields").and_then(Value::as_array) {
            let fields = records_to_fields(records);
            if !fields.is_empty() {
                return fields;
            }
        }
    }

    FormFields::new()
}

fn fields_at(root: &Value) -> FormFields {
    match root {
        Value::Array(records) => records_to_fields(records),
        Value::Object(obj) => match obj.get("fields") {
            Some(Value::Array(records)) => records_to_fields(records),
            _ if is_flat_form(obj) => scalar_members(obj),
            _ => FormFields::new(),
        },
        _ => FormFields::new(),
    }
}

fn records_to_fields(records: &[Value]) -> FormFields {
    let mut out = FormFields::new();
    for record in records {
        let Some(obj) = record.as_object() else {
            continue;
        };
        let Some(name) = ["name", "key", "id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        if let Some(value) = record_value(obj) {
            out.insert(name.to_owned(), value);
        }
    }
    out
}

fn record_value(obj: &Map<String, Value>) -> Option<Value> {
    if let Some(value) = obj.get("value").filter(|v| is_scalar(v)) {
        return Some(value.clone());
    }
    if let Some(id) = obj
        .get("selected_option")
        .and_then(|o| o.get("id"))
        .filter(|v| is_scalar(v))
    {
        return Some(id.clone());
    }
    match obj.get("values").and_then(Value::as_array) {
        Some(values) if values.len() == 1 && is_scalar(&values[0]) => Some(values[0].clone()),
        _ => None,
    }
}

fn is_flat_form(obj: &Map<String, Value>) -> bool {
    FORM_MARKERS.iter().any(|k| match obj.get(*k) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) | Some(Value::Bool(true)) => true,
        _ => false,
    })
}

fn scalar_members(obj: &Map<String, Value>) -> FormFields {
    obj.iter()
        .filter(|(_, v)| is_scalar(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
}
