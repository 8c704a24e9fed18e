//! Pipeline Configuration Module
//!
//! Two independent configuration sources:
//!
//! - [`PipelineSettings`]: operator-tunable runtime settings (fetch and inference deadlines,
//!   CMS endpoint parameters, artifact and report locations, logging) loaded
//!   from TOML.
//! - [`ModelConfig`]: the JSON configuration bundle shipped with the
//!   pretrained artifacts (baseline reconstruction threshold, rolling window,
//!   raw-measurement severity thresholds, device → endpoint mapping).
//!
//! ## Loading Order (runtime settings)
//!
//! 1. `BATTERY_CONFIG` environment variable (path to TOML file)
//! 2. `battery_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Both are plain values threaded explicitly through the pipeline; nothing
//! here is global or mutated after load.

mod settings;
mod model_config;
pub mod defaults;

pub use settings::*;
pub use model_config::*;

use std::path::PathBuf;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Json(PathBuf, serde_json::Error),
    Validation(Vec<String>),
    UnknownDevice(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Json(path, e) => {
                write!(f, "Model config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
            ConfigError::UnknownDevice(device) => {
                write!(f, "Device {} not found in model config", device)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
