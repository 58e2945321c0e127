//! CLI Adapter
//!
//! Command-line interface for the regime gate.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, ClassifyCmd, Command, DecideCmd, SessionCmd, TemplatesCmd};

use anyhow::Result;

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
