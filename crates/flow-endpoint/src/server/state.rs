//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::crypto::FlowCodec;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable so that Axum can clone the state for each
/// request. Nothing request-specific is stored here: session keys live only in
/// the handler that unwrapped them.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Envelope codec bound to the server private key.
    pub codec: FlowCodec,
    /// Screen a successful submission navigates to.
    pub success_screen: Arc<String>,
}

impl AppState {
    /// Create a new [`AppState`].
    pub fn new(codec: FlowCodec, success_screen: String) -> Self {
        Self {
            codec,
            success_screen: Arc::new(success_screen),
        }
    }
}
