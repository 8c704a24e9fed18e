//! Shared data structures for the battery telemetry pipeline
//!
//! Data flows strictly forward through these types:
//! - Raw API records (`serde_json::Value`) → [`CanonicalSample`]
//! - Samples → feature matrix + [`BaseStats`]
//! - Matrix → [`ScoredSample`] + [`WorkingThreshold`]
//! - Scores → [`Severity`] per sample, [`SeverityCount`] per batch
//! - Counts → [`OverallStatus`], all wrapped in an [`InferenceReport`]

mod telemetry;
mod severity;
mod scoring;
mod report;

pub use telemetry::*;
pub use severity::*;
pub use scoring::*;
pub use report::*;
