//! Envelope decoder: raw request body → cleartext JSON + session key.

use common::FlowError;
use serde_json::Value;
use tracing::debug;

use super::cipher::{self, SessionKey};
use super::envelope::{self, IvPolicy};
use super::unwrap::KeyUnwrap;

/// Result of a successful decode.
///
/// Owns the session key for the rest of the request; it is dropped (and
/// zeroised) together with this value.
pub struct DecryptedRequest {
    /// Decrypted payload. Shape is caller-defined.
    pub cleartext: Value,
    pub session_key: SessionKey,
    /// Request IV, kept for reply framings that derive their IV from it.
    pub request_iv: Vec<u8>,
}

impl std::fmt::Debug for DecryptedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Cleartext may carry user data; keep it out of debug output.
        f.debug_struct("DecryptedRequest")
            .field("session_key", &self.session_key)
            .field("request_iv_len", &self.request_iv.len())
            .finish_non_exhaustive()
    }
}

/// Decode and authenticate one request body.
///
/// Steps, each failing with its own [`FlowError`] variant:
/// 1. body as JSON or base64(JSON) → `BadRequest`
/// 2. envelope fields, base64, IV length, tag room → `MalformedEnvelope`
/// 3. RSA-OAEP unwrap → `KeyUnwrapFailed`
/// 4. key length dispatch → `InvalidKeyLength`
/// 5. AES-GCM open → `AuthenticationFailed`
/// 6. plaintext as UTF-8 JSON → `InvalidPlaintext`
pub fn decode_request(
    raw: &str,
    unwrapper: &dyn KeyUnwrap,
    iv_policy: IvPolicy,
) -> Result<DecryptedRequest, FlowError> {
    let body = envelope::parse_body(raw)?;
    let env = envelope::extract(&body, iv_policy)?;
    debug!(
        iv_len = env.iv.len(),
        ciphertext_len = env.ciphertext.len(),
        wrapped_key_len = env.wrapped_key.len(),
        "envelope located"
    );

    let key_bytes = unwrapper.unwrap_key(&env.wrapped_key)?;
    let session_key = SessionKey::from_slice(&key_bytes)?;
    debug!(cipher = session_key.variant().as_str(), "session key unwrapped");

    let plaintext = cipher::open(&session_key, &env.iv, &env.ciphertext, &env.tag)?;
    let cleartext =
        serde_json::from_slice::<Value>(&plaintext).map_err(|_| FlowError::InvalidPlaintext)?;

    Ok(DecryptedRequest {
        cleartext,
        session_key,
        request_iv: env.iv,
    })
}
