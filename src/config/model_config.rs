//! Configuration bundle shipped next to the pretrained artifacts (`config.json`).
//!
//! The file is produced by the training job; unknown keys are ignored and
//! every field the pipeline reads has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{defaults, ConfigError};
use crate::types::{SeverityThresholds, TierBounds};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub hyperparameters: Hyperparameters,

    /// Baseline reconstruction-error threshold from training
    #[serde(default)]
    pub autoencoder_threshold: f64,

    #[serde(default)]
    pub current_thresholds: CurrentThresholds,

    #[serde(default)]
    pub temperature_thresholds: TemperatureThresholds,

    /// Device ids, parallel to `api_endpoints`
    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default)]
    pub api_endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Configured rolling window (samples)
    #[serde(default = "default_roll_win")]
    pub roll_win: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            roll_win: defaults::ROLL_WIN,
        }
    }
}

fn default_roll_win() -> usize {
    defaults::ROLL_WIN
}

/// Current bounds (A). Keys the training job writes but the pipeline does
/// not use (`lower_*`) are ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentThresholds {
    #[serde(default = "default_current_warning")]
    pub upper_warning: f64,
    #[serde(default = "default_current_critical")]
    pub upper_critical: f64,
}

impl Default for CurrentThresholds {
    fn default() -> Self {
        Self {
            upper_warning: defaults::CURRENT_UPPER_WARNING,
            upper_critical: defaults::CURRENT_UPPER_CRITICAL,
        }
    }
}

/// Temperature bounds (°C).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemperatureThresholds {
    #[serde(default = "default_temperature_warning")]
    pub upper_warning: f64,
    #[serde(default = "default_temperature_critical")]
    pub upper_critical: f64,
}

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self {
            upper_warning: defaults::TEMPERATURE_UPPER_WARNING,
            upper_critical: defaults::TEMPERATURE_UPPER_CRITICAL,
        }
    }
}

fn default_current_warning() -> f64 {
    defaults::CURRENT_UPPER_WARNING
}

fn default_current_critical() -> f64 {
    defaults::CURRENT_UPPER_CRITICAL
}

fn default_temperature_warning() -> f64 {
    defaults::TEMPERATURE_UPPER_WARNING
}

fn default_temperature_critical() -> f64 {
    defaults::TEMPERATURE_UPPER_CRITICAL
}

impl ModelConfig {
    /// Load and validate a `config.json`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Json(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn roll_win(&self) -> usize {
        self.hyperparameters.roll_win
    }

    pub fn severity_thresholds(&self) -> SeverityThresholds {
        SeverityThresholds {
            current: TierBounds {
                upper_warning: self.current_thresholds.upper_warning,
                upper_critical: self.current_thresholds.upper_critical,
            },
            temperature: TierBounds {
                upper_warning: self.temperature_thresholds.upper_warning,
                upper_critical: self.temperature_thresholds.upper_critical,
            },
        }
    }

    /// Endpoint URL configured for a device.
    pub fn endpoint_for(&self, device_id: &str) -> Result<&str, ConfigError> {
        self.devices
            .iter()
            .position(|d| d == device_id)
            .and_then(|idx| self.api_endpoints.get(idx))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownDevice(device_id.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if !self.autoencoder_threshold.is_finite() || self.autoencoder_threshold < 0.0 {
            errors.push(format!(
                "autoencoder_threshold must be a finite non-negative number, got {}",
                self.autoencoder_threshold
            ));
        }
        if self.hyperparameters.roll_win == 0 {
            errors.push("hyperparameters.roll_win must be >= 1".to_string());
        }
        let thresholds = self.severity_thresholds();
        Self::check_escalation(thresholds.current, "current_thresholds", &mut errors);
        Self::check_escalation(thresholds.temperature, "temperature_thresholds", &mut errors);
        if self.devices.len() != self.api_endpoints.len() {
            errors.push(format!(
                "devices ({}) and api_endpoints ({}) must have the same length",
                self.devices.len(),
                self.api_endpoints.len()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(bounds: TierBounds, name: &str, errors: &mut Vec<String>) {
        let TierBounds {
            upper_warning: warning,
            upper_critical: critical,
        } = bounds;
        // NaN/Inf comparisons silently pass, catch them explicitly
        if !warning.is_finite() || !critical.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got warning={warning}, critical={critical})"
            ));
            return;
        }
        if critical < warning {
            errors.push(format!(
                "{name}: upper_critical ({critical:.3}) must be >= upper_warning ({warning:.3})"
            ));
        }
    }
}
