pub mod report;
pub mod run_config;
pub mod settings;

pub use report::{CommandFailure, CommandPhase, Fingerprint, IterationResult, RunReport, Verdict};
pub use run_config::{CommandTemplate, RunConfiguration, RunConfigurationBuilder, TemplateContext};
pub use settings::Settings;
