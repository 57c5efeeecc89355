//! Error kinds surfaced to the user, each mapped to a process exit code

use crate::models::CommandFailure;
use std::path::PathBuf;

/// Exit code for every execution or configuration error
pub const EXIT_EXECUTION_ERROR: i32 = 2;

/// Exit code when the run was interrupted (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

pub type RunResult<T> = Result<T, RunError>;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(#[from] CommandFailure),

    #[error("Temporary directory error at {}: {source}", path.display())]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Interrupted")]
    Interrupted,
}

impl RunError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RunError::InvalidArguments(message.into())
    }

    pub fn temp_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunError::TempDir {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Interrupted => EXIT_INTERRUPTED,
            RunError::InvalidArguments(_)
            | RunError::CommandExecution(_)
            | RunError::TempDir { .. } => EXIT_EXECUTION_ERROR,
        }
    }
}
