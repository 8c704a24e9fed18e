//! Battery Telemetry: anomaly pipeline for EV charge-point batteries
//!
//! Fetches recent charge-point telemetry, derives the feature vectors a
//! pretrained autoencoder and outlier detector were fitted on, flags samples
//! whose reconstruction error exceeds an adaptive threshold, and tiers them
//! by raw current/temperature into an overall battery status.
//!
//! ## Architecture
//!
//! - **Acquisition**: HTTP fetch and defensive payload extraction
//! - **Features**: sorted, clipped series → rolling/derivative/calendar features
//! - **ML Engine**: scaling, model scoring, adaptive threshold, severity, status
//! - **Reporting**: gauge mapping and report sinks
//! - **Pipeline**: one device, one batch, one report

pub mod config;
pub mod types;
pub mod acquisition;
pub mod features;
pub mod ml_engine;
pub mod reporting;
pub mod pipeline;
pub mod logging;

// Re-export configuration
pub use config::{ConfigError, ModelConfig, PipelineSettings};

// Re-export commonly used types
pub use types::{
    BaseStats, CanonicalSample, InferenceReport, OverallStatus, SampleVerdict, ScoredSample,
    Severity, SeverityCount, SeverityThresholds, WorkingThreshold,
};

// Re-export stage entry points
pub use acquisition::{extract, ExtractionFailure, FetchError, TelemetryClient};
pub use features::{FeatureBuilder, FeatureError, FeatureMatrix};
pub use ml_engine::{
    AnomalyClassifier, ModelArtifacts, ModelBundle, ModelError, OutlierDetector, Reconstructor,
    ScoreAdapter, StatusResolver,
};
pub use pipeline::{InferencePipeline, PipelineError, RecordSource};
pub use reporting::{GaugeReading, LocalReportSink, ReportSink};
