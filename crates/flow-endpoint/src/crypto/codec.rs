//! [`FlowCodec`]: the decoder and encoder bound to one private key and one
//! set of wire options.

use std::sync::Arc;

use common::FlowError;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::decoder::{decode_request, DecryptedRequest};
use super::encoder::{encode_response, open_response, ResponseFraming};
use super::envelope::{self, IvPolicy};
use super::unwrap::{KeyUnwrap, RsaOaepUnwrapper};

/// The points where integrations disagree, each chosen explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    pub framing: ResponseFraming,
    pub iv_policy: IvPolicy,
    /// Accept unencrypted JSON when an envelope cannot be decrypted.
    ///
    /// Anyone can then submit cleartext that skips the AEAD check. Off unless
    /// explicitly enabled.
    pub allow_plaintext_fallback: bool,
    /// Open every encoded reply again before returning it.
    pub self_check: bool,
}

/// An inbound request after decoding.
#[derive(Debug)]
pub enum Inbound {
    /// Decrypted and authenticated; replies must be encrypted.
    Encrypted(DecryptedRequest),
    /// Accepted through the plaintext fallback; replies go out in clear.
    Plaintext(Value),
}

impl Inbound {
    pub fn cleartext(&self) -> &Value {
        match self {
            Inbound::Encrypted(req) => &req.cleartext,
            Inbound::Plaintext(value) => value,
        }
    }
}

/// Stateless envelope codec. Cheap to share across requests.
#[derive(Clone)]
pub struct FlowCodec {
    unwrapper: Arc<dyn KeyUnwrap>,
    options: CodecOptions,
}

impl FlowCodec {
    pub fn new(unwrapper: Arc<dyn KeyUnwrap>, options: CodecOptions) -> Self {
        Self { unwrapper, options }
    }

    /// Build a codec around a PKCS#8 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Configuration`] if the key is missing or unparseable.
    pub fn from_pem(pem: &str, options: CodecOptions) -> Result<Self, FlowError> {
        let unwrapper = RsaOaepUnwrapper::from_pem(pem)?;
        Ok(Self::new(Arc::new(unwrapper), options))
    }

    pub fn options(&self) -> CodecOptions {
        self.options
    }

    /// Decode one request body. See [`decode_request`].
    pub fn decode(&self, raw: &str) -> Result<DecryptedRequest, FlowError> {
        decode_request(raw, self.unwrapper.as_ref(), self.options.iv_policy)
    }

    /// Decode one request body, falling back to plain JSON when enabled.
    ///
    /// The fallback applies only to decrypt failures
    /// ([`FlowError::is_decrypt_failure`]) of a body that parses as plain JSON.
    pub fn decode_inbound(&self, raw: &str) -> Result<Inbound, FlowError> {
        match self.decode(raw) {
            Ok(req) => Ok(Inbound::Encrypted(req)),
            Err(e) if self.options.allow_plaintext_fallback && e.is_decrypt_failure() => {
                let value = envelope::parse_body(raw).map_err(|_| e.clone())?;
                warn!(
                    reason = e.code(),
                    "envelope not decryptable; accepting plaintext body"
                );
                Ok(Inbound::Plaintext(value))
            }
            Err(e) => Err(e),
        }
    }

    /// Encrypt a reply for `request` using the configured framing.
    ///
    /// # Errors
    ///
    /// See [`encode_response`]. With self-check enabled, also returns
    /// [`FlowError::ResponseMismatch`] if the reply does not open back to `reply`.
    pub fn encode<T>(&self, reply: &T, request: &DecryptedRequest) -> Result<String, FlowError>
    where
        T: Serialize + ?Sized,
    {
        let wire = encode_response(
            reply,
            &request.session_key,
            &request.request_iv,
            self.options.framing,
        )?;

        if self.options.self_check {
            let expected = serde_json::to_value(reply).map_err(|_| FlowError::EncryptionFailed)?;
            match self.open(&wire, request) {
                Ok(opened) if opened == expected => {}
                _ => return Err(FlowError::ResponseMismatch),
            }
        }
        Ok(wire)
    }

    /// Open a reply produced by [`FlowCodec::encode`], as the client would.
    pub fn open(&self, wire: &str, request: &DecryptedRequest) -> Result<Value, FlowError> {
        open_response(
            wire,
            &request.session_key,
            &request.request_iv,
            self.options.framing,
        )
    }
}

impl std::fmt::Debug for FlowCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowCodec")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
