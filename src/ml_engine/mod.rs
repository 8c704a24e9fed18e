//! ML Engine for battery anomaly scoring
//!
//! Turns a feature matrix into severity tiers and an overall status using
//! pretrained, read-only models.
//!
//! ## Architecture
//! - `models`: model traits, `StandardScaler`, artifact loading, `ModelBundle`
//!   compatibility check
//! - `scorer`: scaling, reconstruction error, outlier membership, adaptive
//!   working threshold
//! - `classifier`: severity tier per sample and per-tier counts
//! - `status`: overall status from the counts

pub mod models;
pub mod scorer;
pub mod classifier;
pub mod status;

// Re-export public types
pub use models::{
    ArtifactError, ModelArtifacts, ModelBundle, ModelError, OutlierDetector, Reconstructor,
    StandardScaler,
};
pub use scorer::{adaptive_threshold, percentile, ScoreAdapter, ScoreBatch};
pub use classifier::{AnomalyClassifier, Classification};
pub use status::StatusResolver;
