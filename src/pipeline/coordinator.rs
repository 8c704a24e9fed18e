//! Inference Coordinator - one device, one batch, one report
//!
//! ```text
//! STAGE 1: Fetch     (RecordSource, bounded by the fetch deadline)
//! STAGE 2: Extract   (raw records → canonical samples, failures dropped)
//! STAGE 3: Features  (samples → feature matrix + raw measurements)
//! STAGE 4: Scoring   (scaler, reconstructor, outlier detector, working threshold;
//!                     stages 2-5 bounded by the inference deadline)
//! STAGE 5: Classify  (severity per sample, counts, overall status)
//! STAGE 6: Report    (gauge, report assembly, optional sink)
//! ```
//!
//! Stages 2-5 are synchronous and pure over the batch
//! ([`InferencePipeline::analyze_records`]). `run` bounds the fetch and the
//! model work with separate deadlines. The
//! pipeline owns no mutable state, so one instance can serve concurrent runs
//! for different devices while sharing a single [`ModelBundle`].

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::source::RecordSource;
use crate::acquisition::{extract, FetchError};
use crate::config::PipelineSettings;
use crate::features::{FeatureBuilder, FeatureError};
use crate::ml_engine::{
    adaptive_threshold, AnomalyClassifier, ModelBundle, ModelError, ScoreAdapter, StatusResolver,
};
use crate::reporting::{GaugeReading, LocalReportSink, ReportError, ReportSink};
use crate::types::{InferenceReport, SampleVerdict};

/// Pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Fetch,
    Extract,
    Features,
    Scoring,
    Report,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Fetch => write!(f, "fetch"),
            PipelineStage::Extract => write!(f, "extract"),
            PipelineStage::Features => write!(f, "features"),
            PipelineStage::Scoring => write!(f, "scoring"),
            PipelineStage::Report => write!(f, "report"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch stage failed ({source_name}): {source}")]
    Fetch {
        source_name: String,
        #[source]
        source: FetchError,
    },

    #[error("fetch stage timed out after {0:?}")]
    FetchTimeout(Duration),

    #[error("extract stage failed: none of {records} records yielded a sample")]
    Extract { records: usize },

    #[error("features stage failed: {0}")]
    Features(#[from] FeatureError),

    #[error("scoring stage failed: {0}")]
    Scoring(#[from] ModelError),

    #[error("scoring stage timed out after {0:?}")]
    ScoringTimeout(Duration),

    #[error("report stage failed: {0}")]
    Report(#[from] ReportError),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Fetch { .. } | PipelineError::FetchTimeout(_) => PipelineStage::Fetch,
            PipelineError::Extract { .. } => PipelineStage::Extract,
            PipelineError::Features(_) => PipelineStage::Features,
            PipelineError::Scoring(_) | PipelineError::ScoringTimeout(_) => PipelineStage::Scoring,
            PipelineError::Report(_) => PipelineStage::Report,
        }
    }
}

/// Runs inference for one device per call.
pub struct InferencePipeline {
    bundle: Arc<ModelBundle>,
    fetch_timeout: Duration,
    inference_timeout: Duration,
    sink: Option<Arc<dyn ReportSink>>,
}

impl InferencePipeline {
    /// Pipeline using the deadlines and report directory from settings.
    pub fn new(bundle: Arc<ModelBundle>, settings: &PipelineSettings) -> Self {
        let sink = settings
            .reports
            .local_dir
            .as_ref()
            .map(|dir| Arc::new(LocalReportSink::new(dir.clone())) as Arc<dyn ReportSink>);

        info!(
            features = bundle.feature_names().len(),
            fetch_timeout_secs = settings.fetch.timeout_secs,
            inference_timeout_secs = settings.inference.timeout_secs,
            sink = sink.as_ref().map_or("none", |s| s.sink_name()),
            "Initializing inference pipeline"
        );

        Self {
            bundle,
            fetch_timeout: settings.fetch.timeout(),
            inference_timeout: settings.inference.timeout(),
            sink,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    /// Fetch, analyze and publish one batch for `device_id`.
    ///
    /// Stages 2-5 run on the blocking pool under the inference deadline, so a
    /// slow model never stalls the runtime. On timeout the blocking task is
    /// abandoned, not cancelled; its result is discarded when it finishes.
    pub async fn run(
        &self,
        device_id: &str,
        source: &mut dyn RecordSource,
    ) -> Result<InferenceReport, PipelineError> {
        let device = source.device_label(device_id);
        info!(device = %device, source = source.source_name(), "Starting inference run");

        let fetched = tokio::time::timeout(self.fetch_timeout, source.fetch()).await;
        let records = match fetched {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                return Err(PipelineError::Fetch {
                    source_name: source.source_name().to_string(),
                    source: e,
                })
            }
            Err(_) => return Err(PipelineError::FetchTimeout(self.fetch_timeout)),
        };

        let bundle = Arc::clone(&self.bundle);
        let label = device.clone();
        let analysis = tokio::task::spawn_blocking(move || analyze(&bundle, &label, &records));
        let mut report = match tokio::time::timeout(self.inference_timeout, analysis).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => {
                return Err(PipelineError::Scoring(ModelError::Inference {
                    model: "inference task".to_string(),
                    reason: join.to_string(),
                }))
            }
            Err(_) => {
                warn!(
                    device = %device,
                    timeout_ms = self.inference_timeout.as_millis() as u64,
                    "Model inference exceeded its deadline"
                );
                return Err(PipelineError::ScoringTimeout(self.inference_timeout));
            }
        };

        if let Some(sink) = &self.sink {
            report.report_location = Some(sink.location(&report.device_id)?);
            sink.publish(&report)?;
        }

        info!(
            device = %report.device_id,
            status = %report.status,
            total_anomalies = report.total_anomalies,
            total_samples = report.total_samples,
            "Inference run complete"
        );
        Ok(report)
    }

    /// Stages 2-5 over an already fetched batch, on the calling thread.
    pub fn analyze_records(
        &self,
        device_id: &str,
        records: &[Value],
    ) -> Result<InferenceReport, PipelineError> {
        analyze(&self.bundle, device_id, records)
    }
}

fn analyze(
    bundle: &ModelBundle,
    device_id: &str,
    records: &[Value],
) -> Result<InferenceReport, PipelineError> {
    let mut samples = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        match extract(record) {
            Ok(sample) => samples.push(sample),
            Err(e) => debug!(record = idx, error = %e, "Dropped record"),
        }
    }
    let extract_failures = records.len() - samples.len();
    if extract_failures > 0 {
        warn!(dropped = extract_failures, total = records.len(), "Dropped unusable records");
    }
    if samples.is_empty() && !records.is_empty() {
        return Err(PipelineError::Extract {
            records: records.len(),
        });
    }

    let config = bundle.config();
    let (matrix, base) = FeatureBuilder::build(&samples, bundle.feature_names(), config.roll_win())?;
    let dropped_records = records.len() - matrix.n_rows();

    let scores = ScoreAdapter::new(bundle).score(&matrix)?;
    let threshold = adaptive_threshold(&scores.reconstruction_errors, config.autoencoder_threshold);
    let scored = scores.scored_samples(&base);

    let classification =
        AnomalyClassifier::classify(&scored, &threshold, &config.severity_thresholds());
    let status = StatusResolver::resolve(&classification.counts);
    let total_anomalies = classification.counts.total();

    let verdicts: Vec<SampleVerdict> = base
        .timestamps
        .iter()
        .zip(&scored)
        .zip(&classification.severities)
        .map(|((&timestamp, sample), &severity)| SampleVerdict {
            timestamp,
            current: sample.raw_current,
            temperature: sample.raw_temperature,
            reconstruction_error: sample.reconstruction_error,
            outlier: sample.outlier_flag,
            severity,
        })
        .collect();

    info!(
        device = %device_id,
        samples = matrix.n_rows(),
        threshold = threshold.value,
        adaptive = threshold.is_adaptive(),
        critical = classification.counts.critical,
        high = classification.counts.high,
        medium = classification.counts.medium,
        status = %status,
        "Batch analyzed"
    );

    Ok(InferenceReport {
        device_id: device_id.to_string(),
        status,
        anomalies: classification.counts,
        total_samples: matrix.n_rows(),
        total_anomalies,
        outlier_count: scores.outlier_count(),
        working_threshold: threshold,
        data_points: records.len(),
        dropped_records,
        generated_at: Utc::now(),
        gauge: GaugeReading::new(total_anomalies),
        samples: verdicts,
        report_location: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::ml_engine::{ModelArtifacts, OutlierDetector, Reconstructor, StandardScaler};
    use crate::pipeline::StaticRecordSource;
    use crate::types::OverallStatus;
    use serde_json::json;

    struct Echo;

    impl Reconstructor for Echo {
        fn reconstruct(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
            Ok(batch.to_vec())
        }
    }

    struct AllInliers;

    impl OutlierDetector for AllInliers {
        fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<i8>, ModelError> {
            Ok(vec![1; batch.len()])
        }
    }

    /// Echoes its input after blocking the calling thread.
    struct Slow(Duration);

    impl Reconstructor for Slow {
        fn reconstruct(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
            std::thread::sleep(self.0);
            Ok(batch.to_vec())
        }
    }

    struct Crashing;

    impl Reconstructor for Crashing {
        fn reconstruct(&self, _batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
            panic!("model runtime crashed")
        }
    }

    fn pipeline_with(reconstructor: Box<dyn Reconstructor>) -> InferencePipeline {
        let artifacts = ModelArtifacts {
            config: ModelConfig::default(),
            feature_names: vec!["current".to_string(), "temperature".to_string()],
            scaler: StandardScaler::new(vec![13.0, 50.0], vec![1.0, 1.0]).unwrap(),
        };
        let bundle = ModelBundle::new(artifacts, reconstructor, Box::new(AllInliers)).unwrap();
        InferencePipeline::new(Arc::new(bundle), &PipelineSettings::default())
    }

    fn pipeline() -> InferencePipeline {
        pipeline_with(Box::new(Echo))
    }

    fn batch(n: u32) -> StaticRecordSource {
        StaticRecordSource::new((0..n).map(|m| record(m, 13.0)).collect())
    }

    fn record(minute: u32, current: f64) -> Value {
        json!({
            "createdat": format!("2026-02-11T12:{minute:02}:00Z"),
            "payload": [{"Key": "meterValue", "Value": [[
                {"Key": "sampledValue", "Value": [
                    [{"Key": "measurand", "Value": "Current.Import"}, {"Key": "value", "Value": current.to_string()}],
                    [{"Key": "measurand", "Value": "Temperature"}, {"Key": "value", "Value": "50.0"}]
                ]}
            ]]}]
        })
    }

    #[test]
    fn test_drops_unusable_records() {
        let records = vec![
            record(0, 13.0),
            json!("not a record"),
            record(1, 13.1),
            json!({"payload": {}}),
            record(2, 12.9),
        ];
        let report = pipeline().analyze_records("device4", &records).unwrap();
        assert_eq!(report.data_points, 5);
        assert_eq!(report.dropped_records, 2);
        assert_eq!(report.total_samples, 3);
        assert_eq!(report.status, OverallStatus::Stable);
        assert_eq!(report.samples.len(), 3);
    }

    #[test]
    fn test_non_finite_samples_count_as_dropped() {
        let records = vec![
            record(0, 13.0),
            record(1, f64::NAN),
            record(2, 13.1),
            json!(null),
            record(3, 12.9),
        ];
        let report = pipeline().analyze_records("device4", &records).unwrap();
        assert_eq!(report.data_points, 5);
        assert_eq!(report.dropped_records, 2);
        assert_eq!(report.total_samples, 3);
        assert_eq!(report.data_points - report.dropped_records, report.total_samples);
    }

    #[test]
    fn test_no_usable_record_is_extract_failure() {
        let err = pipeline()
            .analyze_records("device4", &[json!(1), json!([])])
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Extract);
    }

    #[test]
    fn test_too_few_samples_is_features_failure() {
        let err = pipeline()
            .analyze_records("device4", &[record(0, 13.0), record(1, 13.0)])
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Features);
        assert!(matches!(
            err,
            PipelineError::Features(FeatureError::InsufficientData { got: 2, required: 3 })
        ));
    }

    #[test]
    fn test_run_with_static_source() {
        let mut source = batch(6);
        let report = tokio_test::block_on(pipeline().run("device4", &mut source)).unwrap();
        assert_eq!(report.device_id, "device4");
        assert_eq!(report.total_samples, 6);
        assert!(report.report_location.is_none());
    }

    #[tokio::test]
    async fn test_fetch_deadline() {
        let mut source = StaticRecordSource::new(vec![record(0, 13.0)])
            .with_delay(Duration::from_millis(500));
        let pipeline = pipeline().with_fetch_timeout(Duration::from_millis(20));

        let err = pipeline.run("device4", &mut source).await.unwrap_err();
        assert!(matches!(err, PipelineError::FetchTimeout(_)));
        assert_eq!(err.stage(), PipelineStage::Fetch);
    }

    #[tokio::test]
    async fn test_inference_deadline() {
        let pipeline = pipeline_with(Box::new(Slow(Duration::from_millis(800))))
            .with_inference_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let err = pipeline.run("device4", &mut batch(6)).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(matches!(err, PipelineError::ScoringTimeout(_)));
        assert_eq!(err.stage(), PipelineStage::Scoring);
    }

    #[tokio::test]
    async fn test_slow_model_within_deadline_completes() {
        let pipeline = pipeline_with(Box::new(Slow(Duration::from_millis(20))))
            .with_inference_timeout(Duration::from_secs(5));
        let report = pipeline.run("device4", &mut batch(6)).await.unwrap();
        assert_eq!(report.total_samples, 6);
    }

    #[tokio::test]
    async fn test_model_panic_is_scoring_failure() {
        let err = pipeline_with(Box::new(Crashing))
            .run("device4", &mut batch(6))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Scoring);
        assert!(matches!(err, PipelineError::Scoring(ModelError::Inference { .. })));
    }

    #[tokio::test]
    async fn test_published_report_carries_its_location() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(LocalReportSink::new(dir.path()));
        let pipeline = pipeline().with_sink(sink);

        let report = pipeline.run("device4", &mut batch(6)).await.unwrap();
        let location = report.report_location.clone().unwrap();
        let stored: InferenceReport =
            serde_json::from_str(&std::fs::read_to_string(&location).unwrap()).unwrap();
        assert_eq!(stored.report_location, Some(location));
    }
}
