//! Fixtures shared by codec, exchange and server tests.
//!
//! RSA key generation is slow in debug builds, so each key pair is generated
//! once per test binary.

use std::sync::{Arc, OnceLock};

use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::{
    pkcs8::{EncodePrivateKey, LineEnding},
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use serde_json::{json, Value};
use sha2::Sha256;

use super::cipher::{seal, SessionKey};
use super::codec::{CodecOptions, FlowCodec};
use super::unwrap::RsaOaepUnwrapper;

const TEST_KEY_BITS: usize = 1024;

static PRIVATE_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
static OTHER_PRIVATE_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
static UNWRAPPER: OnceLock<RsaOaepUnwrapper> = OnceLock::new();

pub fn private_key() -> &'static RsaPrivateKey {
    PRIVATE_KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut OsRng, TEST_KEY_BITS).expect("generate test RSA key")
    })
}

pub fn other_private_key() -> &'static RsaPrivateKey {
    OTHER_PRIVATE_KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut OsRng, TEST_KEY_BITS).expect("generate test RSA key")
    })
}

pub fn private_key_pem() -> String {
    private_key()
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode test key")
        .to_string()
}

pub fn unwrapper() -> &'static RsaOaepUnwrapper {
    UNWRAPPER.get_or_init(|| RsaOaepUnwrapper::from_key(private_key().clone()))
}

pub fn codec(options: CodecOptions) -> FlowCodec {
    FlowCodec::new(Arc::new(RsaOaepUnwrapper::from_key(private_key().clone())), options)
}

/// RSA-OAEP/SHA-256 wrap `key` under the test public key.
pub fn wrap_key(key: &[u8]) -> Vec<u8> {
    RsaPublicKey::from(private_key())
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
        .expect("wrap test key")
}

/// Build a canonical three-field envelope, the way the platform client does.
pub fn envelope(session_key: &[u8], iv: &[u8], plaintext: &[u8]) -> Value {
    let key = SessionKey::from_slice(session_key).expect("test session key length");
    let (ciphertext, tag) = seal(&key, iv, plaintext).expect("seal test payload");
    let mut blob = ciphertext;
    blob.extend_from_slice(&tag);
    json!({
        "encrypted_flow_data": STANDARD.encode(&blob),
        "encrypted_aes_key": STANDARD.encode(wrap_key(session_key)),
        "initial_vector": STANDARD.encode(iv),
    })
}

/// [`envelope`] serialised as a request body.
pub fn envelope_body(session_key: &[u8], iv: &[u8], cleartext: &Value) -> String {
    let plaintext = serde_json::to_vec(cleartext).expect("serialise cleartext");
    envelope(session_key, iv, &plaintext).to_string()
}
