//! Wire types and the error taxonomy shared by the flow endpoint and its callers.

pub mod error;
pub mod protocol;

pub use error::FlowError;
