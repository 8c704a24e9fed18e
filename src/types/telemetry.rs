//! Canonical telemetry samples and the raw-measurement columns carried
//! alongside the feature matrix.

use serde::{Deserialize, Serialize};

/// Current assumed when a structurally valid record carries no current reading (A).
pub const DEFAULT_CURRENT: f64 = 0.0;

/// Temperature assumed when a structurally valid record carries no temperature reading (°C).
pub const DEFAULT_TEMPERATURE: f64 = 50.0;

/// One normalized telemetry reading extracted from an API record.
///
/// `current` is NOT clamped here; negative values are clipped when a batch
/// is turned into features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSample {
    /// Seconds since the Unix epoch (UTC)
    pub timestamp: i64,
    /// Charging current (A)
    pub current: f64,
    /// Battery / connector temperature (°C)
    pub temperature: f64,
}

impl CanonicalSample {
    pub fn new(timestamp: i64, current: f64, temperature: f64) -> Self {
        Self {
            timestamp,
            current,
            temperature,
        }
    }

    /// Both measurements are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.current.is_finite() && self.temperature.is_finite()
    }
}

/// Post-clip raw measurements, aligned row-for-row with a feature matrix.
///
/// Severity tiers are decided on these raw values, not on scaled features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    pub timestamps: Vec<i64>,
    pub current: Vec<f64>,
    pub temperature: Vec<f64>,
}

impl BaseStats {
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
