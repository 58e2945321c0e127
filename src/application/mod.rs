pub mod orchestrator;

pub use orchestrator::{DecisionOrchestrator, DecisionRequest};
