//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Reasoning: HTTP reasoning service client and file replay
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod reasoning;

pub use cli::CliApp;
pub use reasoning::{HttpReasoningClient, HttpReasoningConfig, ReplayReasoning};
