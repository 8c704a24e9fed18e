//! Per-sample model scores and the working reconstruction threshold.

use serde::{Deserialize, Serialize};

/// Model output for one feature row, joined with its raw measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredSample {
    /// Mean squared difference between the scaled row and its reconstruction (>= 0)
    pub reconstruction_error: f64,
    /// Outlier-detector membership decision (informational only)
    pub outlier_flag: bool,
    pub raw_current: f64,
    pub raw_temperature: f64,
}

/// How the working threshold for a batch was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// The configured baseline threshold was kept.
    Baseline,
    /// The batch median exceeded twice the baseline; the 85th percentile
    /// of the batch's own errors was used instead.
    Adaptive { median: f64 },
}

/// Reconstruction-error cutoff actually applied to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingThreshold {
    pub value: f64,
    pub baseline: f64,
    pub mode: ThresholdMode,
}

impl WorkingThreshold {
    pub fn is_adaptive(&self) -> bool {
        matches!(self.mode, ThresholdMode::Adaptive { .. })
    }
}
