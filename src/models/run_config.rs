use crate::error::{RunError, RunResult};
use std::path::{Path, PathBuf};

pub const DEFAULT_ITERATIONS: usize = 2;

// =============================================================================
// Command templates
// =============================================================================

/// Values substituted into a command template
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub config_file: &'a Path,
    pub workdir: &'a Path,
    /// 1-based iteration, 0 for the baseline capture
    pub iteration: usize,
}

/// A shell command with `{}` style placeholders
///
/// Recognised placeholders:
/// * `{}` / `{config_file}` - absolute path of the configuration file
/// * `{workdir}` - working directory of the run
/// * `{iteration}` - current iteration index
///
/// Anything else in braces is passed through untouched so shell syntax such
/// as `${HOME}` or `awk '{print $1}'` keeps working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the template references the configuration file
    pub fn mentions_config_file(&self) -> bool {
        self.0.contains("{}") || self.0.contains("{config_file}")
    }

    pub fn render(&self, ctx: &TemplateContext<'_>) -> String {
        let config_file = ctx.config_file.to_string_lossy();
        let workdir = ctx.workdir.to_string_lossy();
        let iteration = ctx.iteration.to_string();

        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];

            let replacement = [
                ("{}", &*config_file),
                ("{config_file}", &*config_file),
                ("{workdir}", &*workdir),
                ("{iteration}", iteration.as_str()),
            ]
            .into_iter()
            .find(|(placeholder, _)| tail.starts_with(placeholder));

            match replacement {
                Some((placeholder, value)) => {
                    out.push_str(value);
                    rest = &tail[placeholder.len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Run configuration
// =============================================================================

/// Everything needed to perform one idempotency check.
///
/// Only constructible through [`RunConfiguration::builder`], so every
/// instance has a positive iteration count, both commands and an existing
/// configuration file.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    apply_command: CommandTemplate,
    checksum_command: CommandTemplate,
    config_file: PathBuf,
    iterations: usize,
    temp_dir: Option<PathBuf>,
    verbose: bool,
    capture_baseline: bool,
    validate_config: bool,
}

impl RunConfiguration {
    pub fn builder() -> RunConfigurationBuilder {
        RunConfigurationBuilder::default()
    }

    pub fn apply_command(&self) -> &CommandTemplate {
        &self.apply_command
    }

    pub fn checksum_command(&self) -> &CommandTemplate {
        &self.checksum_command
    }

    /// Absolute path of the configuration file
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// User supplied working directory, if any
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn capture_baseline(&self) -> bool {
        self.capture_baseline
    }

    pub fn validate_config(&self) -> bool {
        self.validate_config
    }
}

#[derive(Debug, Default)]
pub struct RunConfigurationBuilder {
    apply_command: Option<String>,
    checksum_command: Option<String>,
    config_file: Option<PathBuf>,
    iterations: Option<usize>,
    temp_dir: Option<PathBuf>,
    verbose: bool,
    capture_baseline: bool,
    validate_config: bool,
}

impl RunConfigurationBuilder {
    pub fn apply_command(mut self, command: impl Into<String>) -> Self {
        self.apply_command = Some(command.into());
        self
    }

    pub fn checksum_command(mut self, command: impl Into<String>) -> Self {
        self.checksum_command = Some(command.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn capture_baseline(mut self, capture: bool) -> Self {
        self.capture_baseline = capture;
        self
    }

    pub fn validate_config(mut self, validate: bool) -> Self {
        self.validate_config = validate;
        self
    }

    pub fn build(self) -> RunResult<RunConfiguration> {
        let apply_command = non_blank(self.apply_command)
            .ok_or_else(|| RunError::invalid("an apply command is required (-a)"))?;
        let checksum_command = non_blank(self.checksum_command)
            .ok_or_else(|| RunError::invalid("a checksum command is required (-c)"))?;

        let iterations = self.iterations.unwrap_or(DEFAULT_ITERATIONS);
        if iterations == 0 {
            return Err(RunError::invalid("iteration count must be at least 1 (-n)"));
        }

        let config_file = self
            .config_file
            .ok_or_else(|| RunError::invalid("a configuration file is required"))?;
        if !config_file.is_file() {
            return Err(RunError::invalid(format!(
                "configuration file not found: {}",
                config_file.display()
            )));
        }
        // Commands run inside the working directory, so relative paths would
        // resolve against the wrong place.
        let config_file = config_file.canonicalize().map_err(|e| {
            RunError::invalid(format!(
                "cannot resolve configuration file {}: {}",
                config_file.display(),
                e
            ))
        })?;

        Ok(RunConfiguration {
            apply_command: CommandTemplate::new(apply_command),
            checksum_command: CommandTemplate::new(checksum_command),
            config_file,
            iterations,
            temp_dir: self.temp_dir,
            verbose: self.verbose,
            capture_baseline: self.capture_baseline,
            validate_config: self.validate_config,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx<'a>(config: &'a Path, workdir: &'a Path, iteration: usize) -> TemplateContext<'a> {
        TemplateContext {
            config_file: config,
            workdir,
            iteration,
        }
    }

    #[test]
    fn test_render_bare_placeholder() {
        let t = CommandTemplate::new("echo {} > state.txt");
        let out = t.render(&ctx(Path::new("/etc/app.yaml"), Path::new("/tmp/w"), 1));
        assert_eq!(out, "echo /etc/app.yaml > state.txt");
    }

    #[test]
    fn test_render_named_placeholders() {
        let t = CommandTemplate::new("apply --config {config_file} --root {workdir} --run {iteration}");
        let out = t.render(&ctx(Path::new("/c.json"), Path::new("/w"), 3));
        assert_eq!(out, "apply --config /c.json --root /w --run 3");
    }

    #[test]
    fn test_render_leaves_shell_braces_alone() {
        let t = CommandTemplate::new("awk '{print $1}' ${HOME}/x {unknown} {");
        let out = t.render(&ctx(Path::new("/c"), Path::new("/w"), 1));
        assert_eq!(out, "awk '{print $1}' ${HOME}/x {unknown} {");
    }

    #[test]
    fn test_mentions_config_file() {
        assert!(CommandTemplate::new("apply {}").mentions_config_file());
        assert!(CommandTemplate::new("apply {config_file}").mentions_config_file());
        assert!(!CommandTemplate::new("apply fixed.yaml").mentions_config_file());
    }

    #[test]
    fn test_build_requires_commands() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("app.yaml");
        std::fs::write(&config, "a: 1\n").unwrap();

        let err = RunConfiguration::builder()
            .checksum_command("cat state")
            .config_file(&config)
            .build()
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidArguments(_)));
        assert!(err.to_string().contains("-a"));

        let err = RunConfiguration::builder()
            .apply_command("apply {}")
            .checksum_command("   ")
            .config_file(&config)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("-c"));
    }

    #[test]
    fn test_build_rejects_zero_iterations() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("app.yaml");
        std::fs::write(&config, "a: 1\n").unwrap();

        let err = RunConfiguration::builder()
            .apply_command("true")
            .checksum_command("true")
            .config_file(&config)
            .iterations(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidArguments(_)));
    }

    #[test]
    fn test_build_rejects_missing_config_file() {
        let temp = TempDir::new().unwrap();
        let err = RunConfiguration::builder()
            .apply_command("true")
            .checksum_command("true")
            .config_file(temp.path().join("nope.yaml"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_build_defaults() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("app.yaml");
        std::fs::write(&config, "a: 1\n").unwrap();

        let cfg = RunConfiguration::builder()
            .apply_command("true")
            .checksum_command("true")
            .config_file(&config)
            .build()
            .unwrap();
        assert_eq!(cfg.iterations(), DEFAULT_ITERATIONS);
        assert!(cfg.config_file().is_absolute());
        assert!(cfg.temp_dir().is_none());
        assert!(!cfg.verbose());
        assert!(!cfg.capture_baseline());
        assert!(!cfg.validate_config());
    }
}
