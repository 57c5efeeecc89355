use super::command_runner::{CommandExecutor, CommandOutput, ShellCommand, ShellExecutor};
use super::workdir::WorkDir;
use crate::error::RunResult;
use crate::models::{
    CommandFailure, CommandPhase, Fingerprint, IterationResult, RunConfiguration, RunReport,
    TemplateContext,
};
use crate::validator;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

pub const ENV_ITERATION: &str = "IDEMCHECK_ITERATION";
pub const ENV_WORKDIR: &str = "IDEMCHECK_WORKDIR";
pub const ENV_CONFIG_FILE: &str = "IDEMCHECK_CONFIG_FILE";

/// Applies a configuration repeatedly and compares the resulting checksums
pub struct IdempotencyRunner {
    config: RunConfiguration,
    executor: Box<dyn CommandExecutor>,
}

/// Whatever was collected before the loop finished or aborted
#[derive(Default)]
struct Collected {
    baseline: Option<Fingerprint>,
    iterations: Vec<IterationResult>,
    failure: Option<CommandFailure>,
}

impl IdempotencyRunner {
    /// Runner backed by the platform shell
    pub fn new(config: RunConfiguration) -> Self {
        let show_progress = !config.verbose();
        Self::with_executor(config, ShellExecutor::new().with_progress(show_progress))
    }

    pub fn with_executor(config: RunConfiguration, executor: impl CommandExecutor + 'static) -> Self {
        Self {
            config,
            executor: Box::new(executor),
        }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Perform the whole check.
    ///
    /// Command failures do not produce an `Err`: they end the loop and come
    /// back as a report with an execution-error verdict. `Err` is reserved
    /// for problems before or after the loop (invalid configuration file,
    /// working directory trouble).
    pub async fn run(&self) -> RunResult<RunReport> {
        if self.config.validate_config() {
            validator::validate_config_file(self.config.config_file())?;
        }
        if !self.config.apply_command().mentions_config_file() {
            warn!(
                command = %self.config.apply_command(),
                "apply command has no {{}} or {{config_file}} placeholder"
            );
        }

        let started_at = Utc::now();
        let workdir = WorkDir::acquire(self.config.temp_dir())?;
        info!(
            workdir = %workdir.path().display(),
            owned = workdir.is_owned(),
            iterations = self.config.iterations(),
            config_file = %self.config.config_file().display(),
            "starting idempotency check"
        );

        let collected = self.iterate(workdir.path()).await;
        let report = RunReport::derive(
            started_at,
            self.config.iterations(),
            collected.baseline,
            collected.iterations,
            collected.failure,
        );
        info!(verdict = %report.verdict, first_divergence = ?report.first_divergence, "check finished");

        workdir.release()?;
        Ok(report)
    }

    async fn iterate(&self, workdir: &Path) -> Collected {
        let mut collected = Collected::default();

        if self.config.capture_baseline() {
            match self.invoke(CommandPhase::Baseline, 0, workdir).await {
                Ok(output) => {
                    let baseline = Fingerprint::from_output(&output.stdout);
                    info!(checksum = %baseline.text, digest = %baseline.digest, "captured baseline");
                    collected.baseline = Some(baseline);
                }
                Err(failure) => {
                    info!(%failure, "baseline capture failed");
                    collected.failure = Some(failure);
                    return collected;
                }
            }
        }

        for index in 1..=self.config.iterations() {
            let started = Instant::now();

            let apply = match self.invoke(CommandPhase::Apply, index, workdir).await {
                Ok(output) => output,
                Err(failure) => {
                    info!(%failure, "aborting run");
                    collected.failure = Some(failure);
                    return collected;
                }
            };

            let checksum = match self.invoke(CommandPhase::Checksum, index, workdir).await {
                Ok(output) => output,
                Err(failure) => {
                    info!(%failure, "aborting run");
                    collected.failure = Some(failure);
                    return collected;
                }
            };

            let mut result = IterationResult::from_output(index, &checksum.stdout);
            result.apply_exit_code = apply.exit_code;
            result.checksum_exit_code = checksum.exit_code;
            result.apply_stderr = apply.stderr.trim_end().to_string();
            result.checksum_stderr = checksum.stderr.trim_end().to_string();
            result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            info!(
                iteration = index,
                checksum = %result.checksum,
                digest = %result.digest,
                duration_ms = result.duration_ms,
                "iteration complete"
            );
            collected.iterations.push(result);
        }

        collected
    }

    async fn invoke(
        &self,
        phase: CommandPhase,
        iteration: usize,
        workdir: &Path,
    ) -> Result<CommandOutput, CommandFailure> {
        let template = match phase {
            CommandPhase::Apply => self.config.apply_command(),
            CommandPhase::Baseline | CommandPhase::Checksum => self.config.checksum_command(),
        };
        let ctx = TemplateContext {
            config_file: self.config.config_file(),
            workdir,
            iteration,
        };
        let command = template.render(&ctx);

        let label = match phase {
            CommandPhase::Baseline => "Capturing baseline checksum".to_string(),
            _ => format!(
                "Iteration {}/{}: {}",
                iteration,
                self.config.iterations(),
                phase
            ),
        };
        let shell = ShellCommand {
            label,
            command: command.clone(),
            cwd: workdir.to_path_buf(),
            env: vec![
                (ENV_ITERATION.to_string(), iteration.to_string()),
                (ENV_WORKDIR.to_string(), workdir.to_string_lossy().into_owned()),
                (
                    ENV_CONFIG_FILE.to_string(),
                    self.config.config_file().to_string_lossy().into_owned(),
                ),
            ],
        };

        info!(iteration, %phase, %command, "running command");
        let output = self
            .executor
            .execute(&shell)
            .await
            .map_err(|e| CommandFailure::spawn(iteration, phase, &command, &e))?;

        if !output.success {
            return Err(CommandFailure::exited(
                iteration,
                phase,
                command,
                output.exit_code,
                output.stderr.trim_end(),
            ));
        }
        Ok(output)
    }
}
