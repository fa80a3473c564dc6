//! Encrypted interactive-form webhook endpoint.
//!
//! The messaging platform posts an RSA-OAEP/AES-GCM envelope; [`crypto`]
//! recovers the cleartext and session key, [`exchange`] decides the reply,
//! and the reply goes back sealed under the same session key.

pub mod config;
pub mod crypto;
pub mod exchange;
pub mod fields;
pub mod server;
pub mod telemetry;

pub use config::Config;
pub use crypto::FlowCodec;
