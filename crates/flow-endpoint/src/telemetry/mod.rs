//! Tracing subscriber setup: JSON logs, plus OTLP span export when configured.
//!
//! # Telemetry invariants
//!
//! - **No key material or plaintext** in any span attribute or log field.
//!   Lengths, field names, cipher variants and error codes only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init_telemetry;
