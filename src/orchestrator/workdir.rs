//! Working directory for a run: either a temp dir we own or one the user gave us

use crate::error::{RunError, RunResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum WorkDir {
    /// Created for this run; removed on `release` or drop
    Owned(TempDir),
    /// Supplied by the user; never removed
    Provided(PathBuf),
}

impl WorkDir {
    /// Use `provided` (creating it if missing) or allocate a fresh temp dir
    pub fn acquire(provided: Option<&Path>) -> RunResult<Self> {
        match provided {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| RunError::temp_dir(dir, e))?;
                debug!(path = %dir.display(), "using provided working directory");
                Ok(WorkDir::Provided(dir.to_path_buf()))
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("idemcheck-")
                    .tempdir()
                    .map_err(|e| RunError::temp_dir(std::env::temp_dir(), e))?;
                debug!(path = %dir.path().display(), "created temporary working directory");
                Ok(WorkDir::Owned(dir))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WorkDir::Owned(dir) => dir.path(),
            WorkDir::Provided(dir) => dir,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, WorkDir::Owned(_))
    }

    /// Remove an owned directory, reporting failures that drop would swallow
    pub fn release(self) -> RunResult<()> {
        match self {
            WorkDir::Owned(dir) => {
                let path = dir.path().to_path_buf();
                dir.close().map_err(|e| {
                    warn!(path = %path.display(), error = %e, "failed to remove working directory");
                    RunError::temp_dir(&path, e)
                })?;
                debug!(path = %path.display(), "removed temporary working directory");
                Ok(())
            }
            WorkDir::Provided(_) => Ok(()),
        }
    }
}
