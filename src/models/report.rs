use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Command phases and failures
// =============================================================================

/// Which command of an iteration was running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPhase {
    /// Checksum captured before the first apply
    Baseline,
    Apply,
    Checksum,
}

impl fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommandPhase::Baseline => "baseline checksum",
            CommandPhase::Apply => "apply",
            CommandPhase::Checksum => "checksum",
        };
        f.write_str(label)
    }
}

/// A command invocation that aborted the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("iteration {iteration}: {phase} command `{command}` {reason}")]
pub struct CommandFailure {
    /// 1-based iteration index (0 for the baseline capture)
    pub iteration: usize,
    pub phase: CommandPhase,
    /// Command after placeholder substitution
    pub command: String,
    /// None when the process was killed by a signal or never started
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub reason: String,
}

impl CommandFailure {
    /// Build a failure for a process that ran and exited unsuccessfully
    pub fn exited(
        iteration: usize,
        phase: CommandPhase,
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        let reason = match exit_code {
            Some(code) => format!("exited with code {}", code),
            None => "was terminated by a signal".to_string(),
        };
        Self {
            iteration,
            phase,
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
            reason,
        }
    }

    /// Build a failure for a process that could not be started
    pub fn spawn(
        iteration: usize,
        phase: CommandPhase,
        command: impl Into<String>,
        error: &std::io::Error,
    ) -> Self {
        Self {
            iteration,
            phase,
            command: command.into(),
            exit_code: None,
            stderr: String::new(),
            reason: format!("could not be started: {}", error),
        }
    }
}

// =============================================================================
// Iterations
// =============================================================================

/// Outcome of a single apply + checksum round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationResult {
    /// 1-based iteration index
    pub index: usize,

    /// Trimmed stdout of the checksum command, lossily decoded for display
    pub checksum: String,

    /// SHA-256 of the raw trimmed stdout; iterations are compared on this
    pub digest: String,

    pub apply_exit_code: Option<i32>,
    pub checksum_exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub apply_stderr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum_stderr: String,

    pub duration_ms: u64,
}

impl IterationResult {
    pub fn new(index: usize, checksum: impl Into<String>) -> Self {
        Self::from_fingerprint(index, Fingerprint::from(checksum.into()))
    }

    /// Build from the raw stdout of a checksum command
    pub fn from_output(index: usize, stdout: &[u8]) -> Self {
        Self::from_fingerprint(index, Fingerprint::from_output(stdout))
    }

    fn from_fingerprint(index: usize, fingerprint: Fingerprint) -> Self {
        Self {
            index,
            checksum: fingerprint.text,
            digest: fingerprint.digest,
            apply_exit_code: Some(0),
            checksum_exit_code: Some(0),
            apply_stderr: String::new(),
            checksum_stderr: String::new(),
            duration_ms: 0,
        }
    }
}

/// Fingerprint checksum output as `sha256:<hex>`
pub fn digest(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    format!("sha256:{:x}", hasher.finalize())
}

/// Checksum output as shown to the user and as compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub text: String,
    pub digest: String,
}

impl Fingerprint {
    /// Trim surrounding ASCII whitespace and hash the bytes as they are.
    ///
    /// Output that is not UTF-8 still compares exactly; only `text` is lossy.
    pub fn from_output(stdout: &[u8]) -> Self {
        let trimmed = stdout.trim_ascii();
        Self {
            text: String::from_utf8_lossy(trimmed).into_owned(),
            digest: digest(trimmed),
        }
    }
}

impl From<String> for Fingerprint {
    fn from(text: String) -> Self {
        let digest = digest(&text);
        Self { text, digest }
    }
}

impl From<&str> for Fingerprint {
    fn from(text: &str) -> Self {
        Self::from(text.to_string())
    }
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Idempotent,
    NonIdempotent,
    ExecutionError,
}

impl Verdict {
    /// Process exit code for this verdict
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Idempotent => 0,
            Verdict::NonIdempotent => 1,
            Verdict::ExecutionError => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Idempotent => "idempotent",
            Verdict::NonIdempotent => "non-idempotent",
            Verdict::ExecutionError => "execution error",
        };
        f.write_str(label)
    }
}

/// Result of a full run, derived once after the last iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Number of iterations that were requested
    pub requested_iterations: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_digest: Option<String>,

    pub iterations: Vec<IterationResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CommandFailure>,

    pub verdict: Verdict,

    /// First iteration whose checksum differs from iteration 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_divergence: Option<usize>,
}

impl RunReport {
    /// Derive the verdict from the collected iterations.
    ///
    /// A failure always wins: the iterations that did complete are kept but
    /// nothing is concluded from them.
    pub fn derive(
        started_at: DateTime<Utc>,
        requested_iterations: usize,
        baseline: Option<Fingerprint>,
        iterations: Vec<IterationResult>,
        failure: Option<CommandFailure>,
    ) -> Self {
        let first_divergence = if failure.is_some() {
            None
        } else {
            first_divergence(&iterations)
        };

        let verdict = match (&failure, first_divergence) {
            (Some(_), _) => Verdict::ExecutionError,
            (None, Some(_)) => Verdict::NonIdempotent,
            (None, None) => Verdict::Idempotent,
        };

        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            requested_iterations,
            baseline_digest: baseline.as_ref().map(|b| b.digest.clone()),
            baseline: baseline.map(|b| b.text),
            iterations,
            failure,
            verdict,
            first_divergence,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }

    /// Whether the first apply moved the system away from the baseline.
    ///
    /// None when no baseline was captured or no iteration completed.
    pub fn first_apply_changed_state(&self) -> Option<bool> {
        let baseline = self.baseline_digest.as_ref()?;
        let first = self.iterations.first()?;
        Some(first.digest != *baseline)
    }

    /// Number of distinct checksums observed across iterations
    pub fn distinct_checksums(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for iteration in &self.iterations {
            if !seen.contains(&iteration.digest.as_str()) {
                seen.push(&iteration.digest);
            }
        }
        seen.len()
    }
}

/// Index of the first iteration whose checksum differs from the first one
fn first_divergence(iterations: &[IterationResult]) -> Option<usize> {
    let (first, rest) = iterations.split_first()?;
    rest.iter()
        .find(|it| it.digest != first.digest)
        .map(|it| it.index)
}
