//! Envelope encoder: reply JSON → wire string, sealed under the session key.
//!
//! # Reply framings
//!
//! ```text
//! envelope:      base64( {"iv":b64,"ciphertext":b64,"tag":b64} )
//! concatenated:  base64( ciphertext || tag )
//! ```
//!
//! The `envelope` framing always uses a fresh random 12-byte IV and carries
//! it in the reply. The `concatenated` framing carries no IV, so the client
//! must be able to derive it from the request IV; the derivation is part of
//! the framing and fixed by configuration.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::ResponseEnvelope;
use common::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cipher::{self, SessionKey, NONCE_LEN, TAG_LEN};
use super::envelope::BASE64_LENIENT;

/// How the reply IV is derived from the request IV in the `concatenated` framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivedIv {
    /// Every byte XOR `0xFF`.
    Flipped,
    /// Bytes in reverse order.
    Reversed,
}

impl DerivedIv {
    pub fn derive(self, request_iv: &[u8]) -> Vec<u8> {
        match self {
            DerivedIv::Flipped => request_iv.iter().map(|b| !b).collect(),
            DerivedIv::Reversed => request_iv.iter().rev().copied().collect(),
        }
    }
}

/// Wire framing of encrypted replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFraming {
    /// base64 of a JSON `{iv, ciphertext, tag}` object; fresh random IV.
    #[default]
    Envelope,
    /// base64 of `ciphertext || tag`; IV derived from the request IV.
    Concatenated(DerivedIv),
}

impl ResponseFraming {
    /// Name used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseFraming::Envelope => "envelope",
            ResponseFraming::Concatenated(DerivedIv::Flipped) => "concatenated/flipped",
            ResponseFraming::Concatenated(DerivedIv::Reversed) => "concatenated/reversed",
        }
    }
}

/// Serialise `reply` to JSON, seal it under `key`, and frame it.
///
/// # Errors
///
/// Returns [`FlowError::EncryptionFailed`] if serialisation or sealing fails,
/// or [`FlowError::MalformedEnvelope`] if a derived IV has an unsupported length.
pub fn encode_response<T>(
    reply: &T,
    key: &SessionKey,
    request_iv: &[u8],
    framing: ResponseFraming,
) -> Result<String, FlowError>
where
    T: Serialize + ?Sized,
{
    let plaintext = serde_json::to_vec(reply).map_err(|_| FlowError::EncryptionFailed)?;

    match framing {
        ResponseFraming::Envelope => {
            let mut iv = [0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut iv);
            let (ciphertext, tag) = cipher::seal(key, &iv, &plaintext)?;

            let envelope = ResponseEnvelope {
                iv: STANDARD.encode(iv),
                ciphertext: STANDARD.encode(&ciphertext),
                tag: STANDARD.encode(tag),
            };
            let json = serde_json::to_vec(&envelope).map_err(|_| FlowError::EncryptionFailed)?;
            Ok(STANDARD.encode(json))
        }
        ResponseFraming::Concatenated(derivation) => {
            let iv = derivation.derive(request_iv);
            let (mut blob, tag) = cipher::seal(key, &iv, &plaintext)?;
            blob.extend_from_slice(&tag);
            Ok(STANDARD.encode(blob))
        }
    }
}

/// Client-side inverse of [`encode_response`].
///
/// # Errors
///
/// - [`FlowError::MalformedEnvelope`] if the wire string does not match `framing`.
/// - [`FlowError::AuthenticationFailed`] if the tag does not verify.
/// - [`FlowError::InvalidPlaintext`] if the payload is not JSON.
pub fn open_response(
    wire: &str,
    key: &SessionKey,
    request_iv: &[u8],
    framing: ResponseFraming,
) -> Result<Value, FlowError> {
    let outer = BASE64_LENIENT
        .decode(wire.trim())
        .map_err(|_| FlowError::MalformedEnvelope("reply is not valid base64"))?;

    let plaintext = match framing {
        ResponseFraming::Envelope => {
            let envelope: ResponseEnvelope = serde_json::from_slice(&outer).map_err(|_| {
                FlowError::MalformedEnvelope("reply is not an {iv, ciphertext, tag} object")
            })?;
            let iv = decode_part(&envelope.iv)?;
            let ciphertext = decode_part(&envelope.ciphertext)?;
            let tag = decode_part(&envelope.tag)?;
            cipher::open(key, &iv, &ciphertext, &tag)?
        }
        ResponseFraming::Concatenated(derivation) => {
            if outer.len() < TAG_LEN {
                return Err(FlowError::MalformedEnvelope("reply too short for a tag"));
            }
            let (ciphertext, tag) = outer.split_at(outer.len() - TAG_LEN);
            cipher::open(key, &derivation.derive(request_iv), ciphertext, tag)?
        }
    };

    serde_json::from_slice(&plaintext).map_err(|_| FlowError::InvalidPlaintext)
}

fn decode_part(part: &str) -> Result<Vec<u8>, FlowError> {
    BASE64_LENIENT
        .decode(part)
        .map_err(|_| FlowError::MalformedEnvelope("reply field is not valid base64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::protocol::ScreenReply;
    use serde_json::json;

    const REQUEST_IV: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 0xff];

    fn keys() -> [SessionKey; 2] {
        [
            SessionKey::from_slice(&[0x10u8; 16]).unwrap(),
            SessionKey::from_slice(&[0x20u8; 32]).unwrap(),
        ]
    }

    const FRAMINGS: [ResponseFraming; 3] = [
        ResponseFraming::Envelope,
        ResponseFraming::Concatenated(DerivedIv::Flipped),
        ResponseFraming::Concatenated(DerivedIv::Reversed),
    ];

    #[test]
    fn derived_ivs() {
        assert_eq!(
            DerivedIv::Flipped.derive(&[0x00, 0x0f, 0xff]),
            vec![0xff, 0xf0, 0x00]
        );
        assert_eq!(DerivedIv::Reversed.derive(&[1, 2, 3]), vec![3, 2, 1]);
    }

    #[test]
    fn round_trip_reserialises_identically() {
        let reply = json!({
            "version": "3.0",
            "screen": "SERVICE_SUCCESS",
            "data": {"ok": true, "items": [1, 2.5, "three", null], "nested": {"k": "v"}}
        });
        for key in keys() {
            for framing in FRAMINGS {
                let wire = encode_response(&reply, &key, &REQUEST_IV, framing).unwrap();
                let opened = open_response(&wire, &key, &REQUEST_IV, framing).unwrap();
                assert_eq!(
                    serde_json::to_string(&opened).unwrap(),
                    serde_json::to_string(&reply).unwrap(),
                    "{}",
                    framing.as_str()
                );
            }
        }
    }

    #[test]
    fn envelope_framing_shape() {
        let key = SessionKey::from_slice(&[0x10u8; 16]).unwrap();
        let reply = ScreenReply::success("DONE");
        let wire = encode_response(&reply, &key, &REQUEST_IV, ResponseFraming::Envelope).unwrap();

        let inner: Value = serde_json::from_slice(&STANDARD.decode(&wire).unwrap()).unwrap();
        let obj = inner.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        let iv = STANDARD.decode(obj["iv"].as_str().unwrap()).unwrap();
        let tag = STANDARD.decode(obj["tag"].as_str().unwrap()).unwrap();
        assert_eq!(iv.len(), NONCE_LEN);
        assert_eq!(tag.len(), TAG_LEN);
        assert_ne!(iv, REQUEST_IV.to_vec());
    }

    #[test]
    fn envelope_framing_uses_fresh_iv_every_time() {
        let key = SessionKey::from_slice(&[0x20u8; 32]).unwrap();
        let reply = json!({"a": 1});
        let a = encode_response(&reply, &key, &REQUEST_IV, ResponseFraming::Envelope).unwrap();
        let b = encode_response(&reply, &key, &REQUEST_IV, ResponseFraming::Envelope).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn concatenated_framing_is_ciphertext_then_tag() {
        let key = SessionKey::from_slice(&[0x20u8; 32]).unwrap();
        let reply = json!({"data": {"status": "active"}});
        let framing = ResponseFraming::Concatenated(DerivedIv::Flipped);
        let wire = encode_response(&reply, &key, &REQUEST_IV, framing).unwrap();

        let raw = STANDARD.decode(&wire).unwrap();
        let plaintext_len = serde_json::to_vec(&reply).unwrap().len();
        assert_eq!(raw.len(), plaintext_len + TAG_LEN);

        // Decrypts with the flipped IV and nothing else.
        let (ct, tag) = raw.split_at(plaintext_len);
        let flipped = DerivedIv::Flipped.derive(&REQUEST_IV);
        assert!(cipher::open(&key, &flipped, ct, tag).is_ok());
        assert_eq!(
            cipher::open(&key, &REQUEST_IV, ct, tag),
            Err(FlowError::AuthenticationFailed)
        );
    }

    #[test]
    fn framings_are_not_interchangeable() {
        let key = SessionKey::from_slice(&[0x10u8; 16]).unwrap();
        let wire = encode_response(&json!({"a": 1}), &key, &REQUEST_IV, ResponseFraming::Envelope)
            .unwrap();
        assert!(open_response(
            &wire,
            &key,
            &REQUEST_IV,
            ResponseFraming::Concatenated(DerivedIv::Flipped)
        )
        .is_err());

        let framing = ResponseFraming::Concatenated(DerivedIv::Reversed);
        let wire = encode_response(&json!({"a": 1}), &key, &REQUEST_IV, framing).unwrap();
        assert!(matches!(
            open_response(&wire, &key, &REQUEST_IV, ResponseFraming::Envelope),
            Err(FlowError::MalformedEnvelope(_))
        ));
        assert_eq!(
            open_response(
                &wire,
                &key,
                &REQUEST_IV,
                ResponseFraming::Concatenated(DerivedIv::Flipped)
            ),
            Err(FlowError::AuthenticationFailed)
        );
    }

    #[test]
    fn wrong_key_cannot_open_reply() {
        let [k16, k32] = keys();
        let wire = encode_response(&json!({"a": 1}), &k32, &REQUEST_IV, ResponseFraming::Envelope)
            .unwrap();
        assert_eq!(
            open_response(&wire, &k16, &REQUEST_IV, ResponseFraming::Envelope),
            Err(FlowError::AuthenticationFailed)
        );
    }

    #[test]
    fn derived_iv_follows_request_iv_length() {
        let key = SessionKey::from_slice(&[0x10u8; 16]).unwrap();
        let iv16 = [0x44u8; 16];
        let framing = ResponseFraming::Concatenated(DerivedIv::Flipped);
        let wire = encode_response(&json!({"a": 1}), &key, &iv16, framing).unwrap();
        assert_eq!(open_response(&wire, &key, &iv16, framing).unwrap(), json!({"a": 1}));
    }
}
