//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, the pipeline depends only on:
//! - The reasoning service that turns a rendered template into a candidate

pub mod mocks;
pub mod reasoning;

// Re-export main traits and types
pub use mocks::StaticReasoning;
pub use reasoning::{ProposalRequest, ReasoningError, ReasoningPort};
