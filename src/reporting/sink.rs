//! Report sinks - where finished inference reports go

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::defaults;
use crate::types::InferenceReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid device id for report path: '{0}'")]
    InvalidDeviceId(String),
}

/// Destination for finished reports.
///
/// The pipeline asks for [`location`](ReportSink::location) first and stamps
/// it on the report, so the stored copy names where it lives.
pub trait ReportSink: Send + Sync {
    /// Where a report for `device_id` will be stored.
    fn location(&self, device_id: &str) -> Result<String, ReportError>;

    /// Store the report and return where it went.
    fn publish(&self, report: &InferenceReport) -> Result<String, ReportError>;

    fn sink_name(&self) -> &str;
}

/// Writes `<dir>/<device_id>/battery_health_report.json`, replacing any
/// previous report for the device.
#[derive(Debug, Clone)]
pub struct LocalReportSink {
    dir: PathBuf,
}

impl LocalReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn report_path(&self, device_id: &str) -> Result<PathBuf, ReportError> {
        let invalid = device_id.is_empty()
            || device_id == "."
            || device_id == ".."
            || device_id.contains(['/', '\\']);
        if invalid {
            return Err(ReportError::InvalidDeviceId(device_id.to_string()));
        }
        Ok(self.dir.join(device_id).join(defaults::REPORT_FILE_NAME))
    }
}

impl ReportSink for LocalReportSink {
    fn location(&self, device_id: &str) -> Result<String, ReportError> {
        Ok(self.report_path(device_id)?.display().to_string())
    }

    fn publish(&self, report: &InferenceReport) -> Result<String, ReportError> {
        let path = self.report_path(&report.device_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json).map_err(|source| io_error(&path, source))?;

        info!(
            path = %path.display(),
            device = %report.device_id,
            status = %report.status,
            "Report written"
        );
        Ok(path.display().to_string())
    }

    fn sink_name(&self) -> &str {
        "local"
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::GaugeReading;
    use crate::types::{OverallStatus, SeverityCount, ThresholdMode, WorkingThreshold};

    fn report(device_id: &str) -> InferenceReport {
        InferenceReport {
            device_id: device_id.to_string(),
            status: OverallStatus::Stable,
            anomalies: SeverityCount::default(),
            total_samples: 10,
            total_anomalies: 0,
            outlier_count: 1,
            working_threshold: WorkingThreshold {
                value: 0.2,
                baseline: 0.2,
                mode: ThresholdMode::Baseline,
            },
            data_points: 10,
            dropped_records: 0,
            generated_at: chrono::Utc::now(),
            gauge: GaugeReading::new(0),
            samples: Vec::new(),
            report_location: None,
        }
    }

    #[test]
    fn test_local_sink_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalReportSink::new(dir.path());

        let location = sink.publish(&report("0323_1")).unwrap();
        let expected = dir.path().join("0323_1").join("battery_health_report.json");
        assert_eq!(location, expected.display().to_string());
        assert_eq!(sink.location("0323_1").unwrap(), location);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&expected).unwrap()).unwrap();
        assert_eq!(written["status"], "Stable");
        assert_eq!(written["anomalies"]["critical"], 0);
        assert_eq!(written["working_threshold"]["mode"]["kind"], "baseline");
    }

    #[test]
    fn test_republish_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalReportSink::new(dir.path());
        sink.publish(&report("device4")).unwrap();

        let mut second = report("device4");
        second.status = OverallStatus::ModerateIrregularities;
        let location = sink.publish(&second).unwrap();

        let written = std::fs::read_to_string(location).unwrap();
        assert!(written.contains("Moderate Irregularities"));
    }

    #[test]
    fn test_rejects_path_like_device_ids() {
        let sink = LocalReportSink::new("/tmp/reports");
        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                sink.report_path(bad),
                Err(ReportError::InvalidDeviceId(_))
            ));
        }
    }
}
