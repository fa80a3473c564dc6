//! Error taxonomy shared by the envelope codec and its callers.

use thiserror::Error;

/// Every way an encrypted flow exchange can fail.
///
/// All variants are terminal for the current request: none of them can
/// succeed on retry without different input. Display strings are safe to log
/// and never carry key material, plaintext, or underlying library errors.
///
/// Variants map to HTTP status codes returned to callers:
/// - client-caused envelope and plaintext errors → 400
/// - server-side faults ([`FlowError::Configuration`] and the reply and task
///   failures) → 500
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// The body is neither JSON nor base64-encoded JSON.
    #[error("bad request: body is not JSON or base64(JSON)")]
    BadRequest,

    /// A required envelope field is missing, not a string, not valid base64,
    /// or has an unusable length.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// The wrapped session key could not be unwrapped with the private key.
    #[error("session key unwrap failed")]
    KeyUnwrapFailed,

    /// The unwrapped session key is neither 16 nor 32 bytes long.
    #[error("invalid session key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// The GCM tag did not verify: tampered data or the wrong key.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The payload authenticated but is not UTF-8 JSON.
    #[error("decrypted payload is not valid JSON")]
    InvalidPlaintext,

    /// The private key is missing or cannot be parsed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sealing the reply failed.
    #[error("reply encryption failed")]
    EncryptionFailed,

    /// An encoded reply did not open back to the value it was built from.
    #[error("encoded reply failed self-check")]
    ResponseMismatch,

    /// The worker decoding a request did not finish.
    #[error("internal error")]
    Internal,
}

impl FlowError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            FlowError::BadRequest
            | FlowError::MalformedEnvelope(_)
            | FlowError::KeyUnwrapFailed
            | FlowError::InvalidKeyLength(_)
            | FlowError::AuthenticationFailed
            | FlowError::InvalidPlaintext => 400,
            FlowError::Configuration(_)
            | FlowError::EncryptionFailed
            | FlowError::ResponseMismatch
            | FlowError::Internal => 500,
        }
    }

    /// Short machine-readable code used in error bodies and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::BadRequest => "bad_request",
            FlowError::MalformedEnvelope(_) => "malformed_envelope",
            FlowError::KeyUnwrapFailed => "key_unwrap_failed",
            FlowError::InvalidKeyLength(_) => "invalid_key_length",
            FlowError::AuthenticationFailed => "authentication_failed",
            FlowError::InvalidPlaintext => "invalid_plaintext",
            FlowError::Configuration(_) => "configuration_error",
            FlowError::EncryptionFailed => "encryption_failed",
            FlowError::ResponseMismatch => "response_mismatch",
            FlowError::Internal => "internal_error",
        }
    }

    /// Whether the failure came from undecryptable input, as opposed to a
    /// malformed body or a server-side fault.
    ///
    /// Only these failures are eligible for the plaintext fallback.
    pub fn is_decrypt_failure(&self) -> bool {
        matches!(
            self,
            FlowError::MalformedEnvelope(_)
                | FlowError::KeyUnwrapFailed
                | FlowError::InvalidKeyLength(_)
                | FlowError::AuthenticationFailed
                | FlowError::InvalidPlaintext
        )
    }
}
