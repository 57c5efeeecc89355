use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// A fully rendered shell command and where to run it
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Short description shown while the command runs
    pub label: String,
    pub command: String,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

/// What a finished process left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Raw bytes; checksums are compared on these
    pub stdout: Vec<u8>,
    /// Lossily decoded, only ever displayed
    pub stderr: String,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Seam between the idempotency loop and the operating system
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion.
    ///
    /// An `Err` means the process could not be started or its output could
    /// not be read; a non-zero exit is reported through [`CommandOutput`].
    async fn execute(&self, command: &ShellCommand) -> std::io::Result<CommandOutput>;
}

/// Runs commands through the platform shell
#[derive(Debug, Default)]
pub struct ShellExecutor {
    show_progress: bool,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner while each command runs
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }

    fn spinner(&self, label: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message(format!("{}...", label));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &ShellCommand) -> std::io::Result<CommandOutput> {
        let mut cmd = Self::shell(&command.command);
        cmd.current_dir(&command.cwd)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(label = %command.label, command = %command.command, "spawning");
        let mut child = cmd.spawn()?;

        let progress = self.spinner(&command.label);

        // Drain both pipes together so a chatty stderr cannot block stdout
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        let mut stdout_bytes = Vec::new();
        let mut stderr_bytes = Vec::new();
        let (stdout_read, stderr_read) = tokio::join!(
            stdout.read_to_end(&mut stdout_bytes),
            stderr.read_to_end(&mut stderr_bytes),
        );

        // Reap the child before surfacing a read error so its real status is known
        let status = child.wait().await?;
        stdout_read?;
        stderr_read?;

        let stderr_output = String::from_utf8_lossy(&stderr_bytes).into_owned();
        for line in String::from_utf8_lossy(&stdout_bytes).lines() {
            debug!(label = %command.label, "stdout: {}", line);
        }
        for line in stderr_output.lines() {
            debug!(label = %command.label, "stderr: {}", line);
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        debug!(label = %command.label, exit_code = ?status.code(), "finished");

        Ok(CommandOutput {
            success: status.success(),
            exit_code: status.code(),
            stdout: stdout_bytes,
            stderr: stderr_output,
        })
    }
}
