use crate::cli::render;
use crate::error::{RunError, RunResult, EXIT_EXECUTION_ERROR};
use crate::models::{RunConfiguration, RunReport, Settings};
use crate::orchestrator::{IdempotencyRunner, ShellExecutor};
use colored::Colorize;
use std::future::Future;
use std::path::PathBuf;

/// Command-line input before settings are merged in
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub config_file: PathBuf,
    pub iterations: Option<usize>,
    pub temp_dir: Option<PathBuf>,
    pub apply_command: Option<String>,
    pub checksum_command: Option<String>,
    pub verbose: bool,
    pub baseline: bool,
    pub validate: bool,
    pub json: bool,
    pub settings: Option<PathBuf>,
}

/// Merge flags over settings. Flags win; boolean flags can only switch on.
pub fn build_configuration(
    options: &CheckOptions,
    settings: &Settings,
) -> RunResult<RunConfiguration> {
    let mut builder = RunConfiguration::builder()
        .config_file(&options.config_file)
        .temp_dir(options.temp_dir.clone().or_else(|| settings.temp_dir.clone()))
        .verbose(options.verbose)
        .capture_baseline(options.baseline || settings.baseline.unwrap_or(false))
        .validate_config(options.validate || settings.validate.unwrap_or(false));

    if let Some(n) = options.iterations.or(settings.iterations) {
        builder = builder.iterations(n);
    }
    if let Some(cmd) = options.apply_command.as_ref().or(settings.apply_command.as_ref()) {
        builder = builder.apply_command(cmd.as_str());
    }
    if let Some(cmd) = options
        .checksum_command
        .as_ref()
        .or(settings.checksum_command.as_ref())
    {
        builder = builder.checksum_command(cmd.as_str());
    }

    builder.build()
}

fn load_settings(options: &CheckOptions) -> RunResult<Settings> {
    let cwd = std::env::current_dir()
        .map_err(|e| RunError::invalid(format!("cannot determine current directory: {}", e)))?;
    Settings::load(options.settings.as_deref(), &cwd)
        .map_err(|e| RunError::invalid(format!("{:#}", e)))
}

/// The spinner shares stderr with verbose logs and is noise around JSON output
pub fn show_progress(options: &CheckOptions) -> bool {
    !options.verbose && !options.json
}

/// Resolves once the process is asked to stop.
///
/// Handlers are installed before this returns, so a signal arriving before
/// the first poll is not lost to the default disposition.
#[cfg(unix)]
fn interrupted() -> impl Future<Output = ()> {
    use tokio::signal::unix::{signal, Signal, SignalKind};
    use tracing::{info, warn};

    let listen = |kind: SignalKind, name: &str| -> Option<Signal> {
        signal(kind)
            .map_err(|e| warn!(signal = name, error = %e, "cannot install signal handler"))
            .ok()
    };
    let mut interrupt = listen(SignalKind::interrupt(), "SIGINT");
    let mut terminate = listen(SignalKind::terminate(), "SIGTERM");
    let mut hangup = listen(SignalKind::hangup(), "SIGHUP");

    async fn recv(signal: &mut Option<Signal>) -> Option<()> {
        match signal {
            Some(signal) => signal.recv().await,
            None => std::future::pending().await,
        }
    }

    async move {
        tokio::select! {
            Some(()) = recv(&mut interrupt) => info!("received SIGINT"),
            Some(()) = recv(&mut terminate) => info!("received SIGTERM"),
            Some(()) = recv(&mut hangup) => info!("received SIGHUP"),
            else => std::future::pending::<()>().await,
        }
    }
}

#[cfg(not(unix))]
fn interrupted() -> impl Future<Output = ()> {
    async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn execute(options: &CheckOptions) -> RunResult<(IdempotencyRunner, RunReport)> {
    let settings = load_settings(options)?;
    let config = build_configuration(options, &settings)?;
    let executor = ShellExecutor::new().with_progress(show_progress(options));
    let runner = IdempotencyRunner::with_executor(config, executor);

    let stop = interrupted();
    let report = tokio::select! {
        report = runner.run() => report?,
        _ = stop => return Err(RunError::Interrupted),
    };
    Ok((runner, report))
}

/// Run the check end to end and return the process exit code.
///
/// SIGINT, SIGTERM and SIGHUP drop the in-flight run, which removes an owned
/// temp dir and kills the running child before we report the interruption.
pub async fn run(options: CheckOptions) -> i32 {
    let result = execute(&options).await;

    let (runner, report) = match result {
        Ok(done) => done,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            return e.exit_code();
        }
    };

    if options.json {
        match render::to_json(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}", format!("Error: {}", e).red());
                return EXIT_EXECUTION_ERROR;
            }
        }
    } else {
        print!("{}", render::to_human(&report, runner.config()));
    }

    if let Some(failure) = report.failure.clone() {
        eprintln!("{}", format!("Error: {}", RunError::from(failure)).red());
    }

    report.exit_code()
}
