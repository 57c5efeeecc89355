pub mod command_runner;
pub mod idempotency_runner;
pub mod workdir;

pub use command_runner::{CommandExecutor, CommandOutput, ShellCommand, ShellExecutor};
pub use idempotency_runner::IdempotencyRunner;
pub use workdir::WorkDir;
