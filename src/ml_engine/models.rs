//! Pretrained model seams and artifact loading
//!
//! The reconstruction model and the outlier detector are opaque collaborators
//! behind [`Reconstructor`] and [`OutlierDetector`]. Whatever runtime backs
//! them (ONNX export, a sidecar service, a test stub), the pipeline only asks
//! for batch outputs. The scaler and configuration bundle are plain JSON and
//! are loaded here directly.
//!
//! A [`ModelBundle`] is checked for width agreement once, at construction,
//! and is read-only afterwards so it can be shared behind an `Arc` by
//! concurrent invocations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::{defaults, ConfigError, ModelConfig, PipelineSettings};

// ============================================================================
// Errors
// ============================================================================

/// Model invocation and compatibility errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Incompatible model artifacts: {}", .0.join("; "))]
    Incompatible(Vec<String>),

    #[error("{model} returned {got} rows for a batch of {expected}")]
    RowCount {
        model: String,
        expected: usize,
        got: usize,
    },

    #[error("{model} row {row} has width {got}, expected {expected}")]
    RowWidth {
        model: String,
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("{model} produced a non-finite value at row {row}")]
    NonFinite { model: String, row: usize },

    #[error("{model} returned membership {value} at row {row}, expected +1 or -1")]
    InvalidMembership { model: String, row: usize, value: i8 },

    #[error("{model} inference failed: {reason}")]
    Inference { model: String, reason: String },
}

/// Artifact loading errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Scaler mean has {mean} entries but scale has {scale}")]
    ScalerShape { mean: usize, scale: usize },

    #[error("Feature name list is empty")]
    NoFeatures,
}

// ============================================================================
// Model Traits
// ============================================================================

/// Reconstruction-based scorer (autoencoder).
pub trait Reconstructor: Send + Sync {
    /// Reconstruct every scaled row. Output must have the input's shape.
    fn reconstruct(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError>;

    /// Input width the model was built for, when known.
    fn input_width(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "reconstructor"
    }
}

/// Outlier-membership scorer (isolation forest).
pub trait OutlierDetector: Send + Sync {
    /// `+1` (inlier) or `-1` (outlier) per scaled row.
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<i8>, ModelError>;

    fn input_width(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "outlier_detector"
    }
}

// ============================================================================
// Standard Scaler
// ============================================================================

/// Fitted standardisation: `(x - mean) / scale` per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        if mean.len() != scale.len() {
            return Err(ArtifactError::ScalerShape {
                mean: mean.len(),
                scale: scale.len(),
            });
        }
        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Scale one row. Zero-variance columns (scale 0) are only centred.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect()
    }

    pub fn transform_batch(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// JSON artifacts shipped in the model directory.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub config: ModelConfig,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
}

impl ModelArtifacts {
    /// Load `config.json`, `feature_names.json` and `scaler.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let config = ModelConfig::load_from_file(&dir.join(defaults::MODEL_CONFIG_FILE))?;
        let feature_names: Vec<String> = read_json(&dir.join(defaults::FEATURE_NAMES_FILE))?;
        if feature_names.is_empty() {
            return Err(ArtifactError::NoFeatures);
        }
        let raw: StandardScaler = read_json(&dir.join(defaults::SCALER_FILE))?;
        let scaler = StandardScaler::new(raw.mean, raw.scale)?;

        info!(
            dir = %dir.display(),
            features = feature_names.len(),
            roll_win = config.roll_win(),
            baseline_threshold = config.autoencoder_threshold,
            "Loaded model artifacts"
        );

        Ok(Self {
            config,
            feature_names,
            scaler,
        })
    }

    /// Load from the `[artifacts] model_dir` of the runtime settings.
    pub fn load_from_settings(settings: &PipelineSettings) -> Result<Self, ArtifactError> {
        Self::load(&settings.artifacts.model_dir)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Bundle
// ============================================================================

/// Everything needed to score a batch. Immutable after construction.
pub struct ModelBundle {
    artifacts: ModelArtifacts,
    reconstructor: Box<dyn Reconstructor>,
    detector: Box<dyn OutlierDetector>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("features", &self.artifacts.feature_names.len())
            .field("reconstructor", &self.reconstructor.name())
            .field("detector", &self.detector.name())
            .finish()
    }
}

impl ModelBundle {
    /// Assemble a bundle, rejecting any artifact whose width disagrees with
    /// the feature-name list.
    pub fn new(
        artifacts: ModelArtifacts,
        reconstructor: Box<dyn Reconstructor>,
        detector: Box<dyn OutlierDetector>,
    ) -> Result<Self, ModelError> {
        let expected = artifacts.feature_names.len();
        let mut problems = Vec::new();

        if artifacts.scaler.n_features() != expected {
            problems.push(format!(
                "scaler expects {} features, feature list has {}",
                artifacts.scaler.n_features(),
                expected
            ));
        }
        if let Some(width) = reconstructor.input_width().filter(|w| *w != expected) {
            problems.push(format!(
                "{} expects {} features, feature list has {}",
                reconstructor.name(),
                width,
                expected
            ));
        }
        if let Some(width) = detector.input_width().filter(|w| *w != expected) {
            problems.push(format!(
                "{} expects {} features, feature list has {}",
                detector.name(),
                width,
                expected
            ));
        }

        if !problems.is_empty() {
            return Err(ModelError::Incompatible(problems));
        }

        Ok(Self {
            artifacts,
            reconstructor,
            detector,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.artifacts.config
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifacts.feature_names
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.artifacts.scaler
    }

    pub fn reconstructor(&self) -> &dyn Reconstructor {
        self.reconstructor.as_ref()
    }

    pub fn detector(&self) -> &dyn OutlierDetector {
        self.detector.as_ref()
    }
}
