//! Inbound envelope discovery: body parsing, field aliases, base64 and IV checks.
//!
//! Nothing here touches key material. Every check in this module runs before
//! the RSA unwrap, so a structurally invalid envelope never reaches it.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use common::FlowError;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::cipher::{EXTENDED_NONCE_LEN, NONCE_LEN, TAG_LEN};

/// Standard alphabet, padding optional on decode. Callers differ on whether
/// they pad.
pub(crate) const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One accepted spelling of the three envelope fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeFieldNames {
    /// AES-GCM ciphertext with the 16-byte tag appended.
    pub flow_data: &'static str,
    /// RSA-OAEP wrapped session key.
    pub aes_key: &'static str,
    /// GCM nonce.
    pub iv: &'static str,
}

/// Accepted field-name sets, in priority order. The first set whose three
/// fields are all present is used.
pub const FIELD_ALIASES: &[EnvelopeFieldNames] = &[
    EnvelopeFieldNames {
        flow_data: "encrypted_flow_data",
        aes_key: "encrypted_aes_key",
        iv: "initial_vector",
    },
    EnvelopeFieldNames {
        flow_data: "encrypted_flow_data",
        aes_key: "encrypted_aes_key",
        iv: "iv",
    },
];

/// Accepted request IV lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IvPolicy {
    /// Exactly 12 bytes.
    #[default]
    Strict,
    /// 12 or 16 bytes.
    Extended,
}

impl IvPolicy {
    pub fn accepts(self, len: usize) -> bool {
        match self {
            IvPolicy::Strict => len == NONCE_LEN,
            IvPolicy::Extended => len == NONCE_LEN || len == EXTENDED_NONCE_LEN,
        }
    }
}

/// The three decoded envelope values, ready for unwrap and decryption.
pub struct EncryptedEnvelope {
    pub wrapped_key: Vec<u8>,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Parse a raw request body as JSON, or as base64-encoded JSON.
///
/// # Errors
///
/// Returns [`FlowError::BadRequest`] if neither interpretation succeeds.
pub fn parse_body(raw: &str) -> Result<Value, FlowError> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }
    let decoded = BASE64_LENIENT
        .decode(raw.trim())
        .map_err(|_| FlowError::BadRequest)?;
    serde_json::from_slice(&decoded).map_err(|_| FlowError::BadRequest)
}

/// Locate and decode the envelope fields of a parsed body.
///
/// # Errors
///
/// Returns [`FlowError::MalformedEnvelope`] if no alias set is complete, a
/// field is not a base64 string, the IV length is not accepted by `policy`,
/// or the ciphertext blob has no room for a tag.
pub fn extract(body: &Value, policy: IvPolicy) -> Result<EncryptedEnvelope, FlowError> {
    let obj = body
        .as_object()
        .ok_or(FlowError::MalformedEnvelope("envelope is not a JSON object"))?;

    let names = FIELD_ALIASES
        .iter()
        .find(|names| {
            is_present(obj, names.flow_data)
                && is_present(obj, names.aes_key)
                && is_present(obj, names.iv)
        })
        .ok_or(FlowError::MalformedEnvelope("missing envelope fields"))?;

    let wrapped_key = decode_field(obj, names.aes_key, "encrypted key is not valid base64")?;
    let iv = decode_field(obj, names.iv, "initial vector is not valid base64")?;
    let blob = decode_field(obj, names.flow_data, "encrypted data is not valid base64")?;

    if !policy.accepts(iv.len()) {
        return Err(FlowError::MalformedEnvelope("initial vector has wrong length"));
    }
    if blob.len() <= TAG_LEN {
        return Err(FlowError::MalformedEnvelope("encrypted data too short for a tag"));
    }

    let (ciphertext, tag_bytes) = blob.split_at(blob.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_bytes);

    Ok(EncryptedEnvelope {
        wrapped_key,
        iv,
        ciphertext: ciphertext.to_vec(),
        tag,
    })
}

/// Present means non-null and, for strings, non-empty.
fn is_present(obj: &Map<String, Value>, name: &str) -> bool {
    match obj.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn decode_field(
    obj: &Map<String, Value>,
    name: &str,
    invalid: &'static str,
) -> Result<Vec<u8>, FlowError> {
    let text = obj
        .get(name)
        .and_then(Value::as_str)
        .ok_or(FlowError::MalformedEnvelope(invalid))?;
    BASE64_LENIENT
        .decode(text.trim())
        .map_err(|_| FlowError::MalformedEnvelope(invalid))
}
