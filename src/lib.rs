// idemcheck - Configuration idempotency tester
// Applies a configuration repeatedly and compares system-state checksums

pub mod cli;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod validator;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use error::{RunError, RunResult};
pub use models::{CommandFailure, IterationResult, RunConfiguration, RunReport, Verdict};
pub use orchestrator::IdempotencyRunner;
