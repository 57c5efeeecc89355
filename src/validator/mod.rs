pub mod config_file;

pub use config_file::{validate_config_file, ConfigFormat};
