use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the current directory
pub const LOCAL_SETTINGS_FILE: &str = "idemcheck.toml";

/// Defaults for a run, read from a TOML file.
///
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub iterations: Option<usize>,

    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub apply_command: Option<String>,

    #[serde(default)]
    pub checksum_command: Option<String>,

    /// Capture a checksum before the first apply
    #[serde(default)]
    pub baseline: Option<bool>,

    /// Parse the configuration file before running
    #[serde(default)]
    pub validate: Option<bool>,
}

impl Settings {
    /// Resolve and load settings.
    ///
    /// An explicit path must exist. Otherwise `./idemcheck.toml` and then
    /// `<config dir>/idemcheck/config.toml` are tried; when neither exists
    /// the defaults are returned.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                anyhow::bail!("Settings file not found: {}", path.display());
            }
            return Self::load_from(path);
        }

        match Self::discover(cwd) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a single settings file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    fn discover(cwd: &Path) -> Option<PathBuf> {
        let local = cwd.join(LOCAL_SETTINGS_FILE);
        if local.is_file() {
            return Some(local);
        }

        let user = dirs::config_dir()?.join("idemcheck").join("config.toml");
        user.is_file().then_some(user)
    }
}
