//! Severity taxonomy, per-batch severity counts and the overall status label.

use serde::{Deserialize, Serialize};

/// Anomaly impact level assigned to a single sample.
///
/// Ordered from least to most severe so tiers compare with `<`/`>`.
/// `Low` exists in the taxonomy but the current classification policy never
/// assigns it (see `ml_engine::classifier`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Normal => write!(f, "normal"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Count of anomalous samples per tier. Normal samples are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCount {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCount {
    /// Record one sample. `Normal` is ignored.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Normal => {}
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Human-facing battery status derived from a [`SeverityCount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    #[serde(rename = "Immediate Action Required")]
    ImmediateActionRequired,
    #[serde(rename = "Degradation Accelerating")]
    DegradationAccelerating,
    #[serde(rename = "Moderate Irregularities")]
    ModerateIrregularities,
    #[serde(rename = "Stable")]
    Stable,
}

impl OverallStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OverallStatus::ImmediateActionRequired => "Immediate Action Required",
            OverallStatus::DegradationAccelerating => "Degradation Accelerating",
            OverallStatus::ModerateIrregularities => "Moderate Irregularities",
            OverallStatus::Stable => "Stable",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Upper warning/critical bounds for one raw measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBounds {
    pub upper_warning: f64,
    pub upper_critical: f64,
}

/// Raw-measurement bounds used to tier anomalous samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    /// Current bounds (A)
    pub current: TierBounds,
    /// Temperature bounds (°C)
    pub temperature: TierBounds,
}
