//! Structured inference result handed to reporting sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OverallStatus, Severity, SeverityCount, WorkingThreshold};
use crate::reporting::GaugeReading;

/// Verdict for one analyzed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleVerdict {
    pub timestamp: i64,
    pub current: f64,
    pub temperature: f64,
    pub reconstruction_error: f64,
    /// Outlier-detector decision, kept for display; does not affect severity
    pub outlier: bool,
    pub severity: Severity,
}

/// Result of one inference run for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceReport {
    pub device_id: String,
    pub status: OverallStatus,
    pub anomalies: SeverityCount,
    /// Samples that reached the feature matrix
    pub total_samples: usize,
    pub total_anomalies: usize,
    /// Samples the outlier detector flagged (informational)
    pub outlier_count: usize,
    pub working_threshold: WorkingThreshold,
    /// Raw records received from the source
    pub data_points: usize,
    /// Records that did not reach the feature matrix: extractor failures
    /// plus samples with a non-finite current or temperature.
    /// `data_points - dropped_records == total_samples`.
    pub dropped_records: usize,
    pub generated_at: DateTime<Utc>,
    pub gauge: GaugeReading,
    pub samples: Vec<SampleVerdict>,
    /// Where the report is published, if a sink was configured. Set before
    /// publishing, so the stored copy carries it too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_location: Option<String>,
}
