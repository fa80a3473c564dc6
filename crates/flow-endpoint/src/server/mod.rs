//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with the flow endpoint and shared middleware.
//! - Answer unauthenticated liveness probes without touching the codec.
//! - Map codec errors to status codes and generic error bodies.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
