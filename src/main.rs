use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use idemcheck::cli::CheckOptions;
use idemcheck::error::EXIT_EXECUTION_ERROR;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "idemcheck")]
#[command(author = "Chris Cheng <chris.cheng@shopee.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Verify configuration idempotency by applying a configuration repeatedly and comparing system-state checksums",
    long_about = None
)]
#[command(after_help = "Placeholders in -a/-c: {} or {config_file}, {workdir}, {iteration}\n\
Exit codes: 0 idempotent, 1 non-idempotent, 2 execution error, 130 interrupted")]
struct Cli {
    /// Configuration file handed to the apply command
    #[arg(required_unless_present = "completions")]
    config_file: Option<PathBuf>,

    /// Number of times to apply the configuration [default: 2]
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Working directory for the commands (a temporary one is created and removed otherwise)
    #[arg(short = 't', long)]
    temp_dir: Option<PathBuf>,

    /// Command printing a fingerprint of the system state on stdout
    #[arg(short = 'c', long)]
    checksum_command: Option<String>,

    /// Command applying the configuration, e.g. "my-applier --config {}"
    #[arg(short = 'a', long)]
    apply_command: Option<String>,

    /// Log every command and its output
    #[arg(short, long)]
    verbose: bool,

    /// Capture a checksum before the first apply
    #[arg(long)]
    baseline: bool,

    /// Parse the configuration file (YAML, JSON or TOML) before running
    #[arg(long)]
    validate: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Settings file with defaults (default: ./idemcheck.toml if present)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "idemcheck", &mut io::stdout());
        return;
    }

    idemcheck::logging::init(cli.verbose);

    let options = CheckOptions {
        config_file: cli.config_file.unwrap_or_default(),
        iterations: cli.iterations,
        temp_dir: cli.temp_dir,
        apply_command: cli.apply_command,
        checksum_command: cli.checksum_command,
        verbose: cli.verbose,
        baseline: cli.baseline,
        validate: cli.validate,
        json: cli.json,
        settings: cli.settings,
    };

    // Iterations are strictly sequential, one worker is plenty
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Error: failed to start runtime: {}", e).red());
            std::process::exit(EXIT_EXECUTION_ERROR);
        }
    };

    let code = runtime.block_on(idemcheck::cli::check::run(options));
    drop(runtime);
    std::process::exit(code);
}
