//! Hybrid envelope codec: RSA-OAEP key unwrap + AES-GCM payload.
//!
//! This module is free of HTTP dependencies. The server layer hands it a raw
//! body and gets back cleartext plus a session key, then hands it a reply and
//! gets back the wire string.
//!
//! # Inbound envelope
//!
//! ```text
//! {
//!   "encrypted_aes_key":   b64(RSA-OAEP-SHA256(session_key)),
//!   "initial_vector":      b64(iv),            // 12 bytes
//!   "encrypted_flow_data": b64(ciphertext || tag)
//! }
//! ```
//!
//! The body may itself be base64 of that JSON.
//!
//! # Key material
//!
//! Session keys are zeroised on drop and never logged. Nothing is cached
//! between requests.

pub mod cipher;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod envelope;
pub mod unwrap;

#[cfg(test)]
pub(crate) mod test_support;

pub use cipher::{CipherVariant, SessionKey};
pub use codec::{CodecOptions, FlowCodec, Inbound};
pub use decoder::DecryptedRequest;
pub use encoder::{DerivedIv, ResponseFraming};
pub use envelope::IvPolicy;
pub use unwrap::{KeyUnwrap, RsaOaepUnwrapper};
