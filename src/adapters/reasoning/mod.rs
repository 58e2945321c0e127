//! Reasoning Adapters
//!
//! Production implementations of `ReasoningPort`:
//! - `http`: JSON-over-HTTP reasoning service client
//! - `replay`: candidate recorded in a local file

pub mod http;
pub mod replay;

pub use http::{HttpReasoningClient, HttpReasoningConfig};
pub use replay::ReplayReasoning;
