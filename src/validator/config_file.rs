use crate::error::{RunError, RunResult};
use std::path::Path;
use tracing::{info, warn};

/// Formats the configuration file can be checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Guess the format from the file extension
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Parse `content`, returning the parser's message on failure
    pub fn check(self, content: &str) -> Result<(), String> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str::<serde_json::Value>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str::<toml::Table>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
            ConfigFormat::Toml => "TOML",
        };
        f.write_str(name)
    }
}

/// Make sure the configuration file parses before anything is applied.
///
/// Files with an unrecognised extension are let through with a warning.
pub fn validate_config_file(path: &Path) -> RunResult<()> {
    let Some(format) = ConfigFormat::detect(path) else {
        warn!(path = %path.display(), "unknown configuration format, skipping validation");
        return Ok(());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        RunError::invalid(format!("cannot read configuration file {}: {}", path.display(), e))
    })?;

    format.check(&content).map_err(|message| {
        RunError::invalid(format!(
            "{} validation failed for {}: {}",
            format,
            path.display(),
            message
        ))
    })?;

    info!(path = %path.display(), %format, "configuration file validated");
    Ok(())
}
